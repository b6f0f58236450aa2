use std::sync::Arc;

use anyhow::Context;
use hook_lab::{
    api,
    auth::StaticTokenAuthenticator,
    config::AppConfig,
    db::{memory::MemoryHookStore, pg::PgHookStore, HookStore},
    outbound::ReqwestOutbound,
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hook_lab=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()
        .map_err(|err| anyhow::anyhow!("invalid config: {err}"))?;

    let store: Arc<dyn HookStore> = match &config.database_url {
        Some(database_url) => {
            let store = PgHookStore::connect(database_url).await?;
            sqlx::migrate!("./migrations").run(store.pool()).await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, captures are kept in memory only");
            Arc::new(MemoryHookStore::default())
        }
    };
    let client =
        ReqwestOutbound::new(config.outbound_timeout).context("building HTTP client")?;
    let authenticator = StaticTokenAuthenticator::new(config.owner_tokens.clone());

    let mut state = api::AppState::new(store, Arc::new(client), Arc::new(authenticator));
    state.max_capture_body_bytes = config.max_capture_body_bytes;
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
