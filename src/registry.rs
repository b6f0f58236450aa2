use uuid::Uuid;

use crate::{db::HookStore, domain::Endpoint, errors::AppError};

const SLUG_LEN: usize = 16;

/// Fresh opaque slug: 16 lowercase hex characters drawn from a v4 UUID.
pub fn generate_slug() -> String {
    let mut slug = Uuid::new_v4().simple().to_string();
    slug.truncate(SLUG_LEN);
    slug
}

/// Resolves a public slug to an endpoint that may accept captures.
///
/// Unknown slugs and inactive endpoints are indistinguishable to callers.
pub async fn resolve(store: &dyn HookStore, slug: &str) -> Result<Endpoint, AppError> {
    match store.find_endpoint_by_slug(slug).await? {
        Some(endpoint) if endpoint.is_active => Ok(endpoint),
        Some(_) => {
            tracing::debug!(slug, "capture refused: endpoint inactive");
            Err(AppError::not_found("Endpoint not found"))
        }
        None => Err(AppError::not_found("Endpoint not found")),
    }
}
