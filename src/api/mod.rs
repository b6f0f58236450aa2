use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRef, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::json;

use crate::{
    auth::Authenticator,
    capture::{self, PersistFailureHook},
    db::HookStore,
    domain::{Endpoint, NewCapturedRequest},
    errors::AppError,
    forwarder::{ForwardJob, Forwarder},
    outbound::OutboundClient,
    registry,
    replayer::Replayer,
};

mod manage;

pub const DEFAULT_MAX_CAPTURE_BODY_BYTES: usize = 5_242_880;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HookStore>,
    pub client: Arc<dyn OutboundClient>,
    pub authenticator: Arc<dyn Authenticator>,
    pub max_capture_body_bytes: usize,
    pub on_persist_failure: Option<PersistFailureHook>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HookStore>,
        client: Arc<dyn OutboundClient>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            store,
            client,
            authenticator,
            max_capture_body_bytes: DEFAULT_MAX_CAPTURE_BODY_BYTES,
            on_persist_failure: None,
        }
    }

    fn forwarder(&self) -> Forwarder {
        Forwarder::new(Arc::clone(&self.store), Arc::clone(&self.client))
    }

    fn replayer(&self) -> Replayer {
        Replayer::new(Arc::clone(&self.store), Arc::clone(&self.client))
    }
}

impl FromRef<AppState> for Arc<dyn Authenticator> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.authenticator)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hook/:slug", any(capture))
        .route("/hook/:slug/*rest", any(capture_nested))
        .route(
            "/api/endpoints",
            get(manage::list_endpoints).post(manage::create_endpoint),
        )
        .route(
            "/api/endpoints/:id",
            get(manage::get_endpoint)
                .patch(manage::update_endpoint)
                .delete(manage::delete_endpoint),
        )
        .route("/api/endpoints/:id/requests", get(manage::list_requests))
        .route("/api/requests/:id", get(manage::get_request))
        .route("/api/requests/:id/replays", get(manage::list_replays))
        .route("/api/requests/:id/replay", post(manage::replay_request))
        .with_state(state)
}

async fn capture(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    handle_capture(state, slug, method, uri, headers, body).await
}

async fn capture_nested(
    State(state): State<AppState>,
    Path((slug, _rest)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    handle_capture(state, slug, method, uri, headers, body).await
}

/// Records one inbound call and answers with the endpoint's canned response.
/// Nothing past the slug lookup can change what the sender receives.
async fn handle_capture(
    state: AppState,
    slug: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let endpoint = match registry::resolve(state.store.as_ref(), &slug).await {
        Ok(endpoint) => endpoint,
        Err(err) => {
            if !matches!(err, AppError::NotFound(_)) {
                tracing::error!(slug = %slug, error = %err, "endpoint lookup failed");
            }
            return endpoint_not_found();
        }
    };

    let body = capture::read_body(&method, body, state.max_capture_body_bytes).await;
    let forward_body = body.as_ref().map(|body| body.raw().to_owned());
    let record = NewCapturedRequest {
        endpoint_id: endpoint.id,
        method: method.to_string(),
        path: uri.path().to_owned(),
        query_params: capture::query_params(&uri),
        headers: capture::flatten_headers(&headers),
        body,
        source_ip: capture::source_ip(&headers),
    };

    let stored = capture::persist(
        state.store.as_ref(),
        record,
        state.on_persist_failure.as_ref(),
    )
    .await;

    if let Ok(stored) = stored {
        tracing::info!(
            slug = %slug,
            request_id = %stored.id,
            method = %stored.method,
            "captured request"
        );
        if let Some(target_url) = endpoint.forward_url.clone() {
            state
                .forwarder()
                .forward(ForwardJob {
                    request_id: stored.id,
                    slug: endpoint.slug.clone(),
                    target_url,
                    method: stored.method,
                    headers: stored.headers,
                    body: forward_body,
                })
                .await;
        }
    }

    canned_response(&endpoint)
}

fn endpoint_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
        .into_response()
}

fn canned_response(endpoint: &Endpoint) -> Response {
    let status = u16::try_from(endpoint.response_status)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or_else(|| {
            tracing::warn!(
                slug = %endpoint.slug,
                response_status = endpoint.response_status,
                "invalid configured status, answering 200"
            );
            StatusCode::OK
        });

    let mut response = (status, endpoint.response_body.clone()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    for (name, value) in &endpoint.response_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(
                slug = %endpoint.slug,
                header = %name,
                "skipping invalid response header"
            ),
        }
    }
    response
}
