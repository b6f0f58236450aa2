//! Owner-authenticated management of endpoints, captures and replays.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::{
    auth::Owner,
    domain::{
        CapturedRequest, CapturedRequestDetail, CreateEndpointRequest, Endpoint, EndpointChanges,
        NewEndpoint, ReplayAttempt, ReplayRequest, ReplayResponse, DEFAULT_RESPONSE_BODY,
        DEFAULT_RESPONSE_STATUS,
    },
    errors::AppError,
    registry,
};

pub const REQUEST_LIST_LIMIT: usize = 100;

pub(super) async fn list_endpoints(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<Endpoint>>, AppError> {
    Ok(Json(state.store.list_endpoints(owner_id).await?))
}

pub(super) async fn create_endpoint(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    payload: Result<Json<CreateEndpointRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Endpoint>), AppError> {
    let Json(payload) = payload?;
    let name = validate_name(payload.name)?;
    let response_status = match payload.response_status {
        Some(status) => validate_status(status)?,
        None => DEFAULT_RESPONSE_STATUS,
    };

    let endpoint = state
        .store
        .create_endpoint(NewEndpoint {
            owner_id,
            slug: registry::generate_slug(),
            name,
            description: payload.description,
            forward_url: validate_forward_url(payload.forward_url)?,
            response_status,
            response_body: payload
                .response_body
                .unwrap_or_else(|| DEFAULT_RESPONSE_BODY.to_owned()),
            response_headers: payload.response_headers.unwrap_or_default(),
            is_active: payload.is_active.unwrap_or(true),
        })
        .await?;

    tracing::info!(endpoint_id = %endpoint.id, slug = %endpoint.slug, "endpoint created");
    Ok((StatusCode::CREATED, Json(endpoint)))
}

pub(super) async fn get_endpoint(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Endpoint>, AppError> {
    Ok(Json(owned_endpoint(&state, owner_id, id).await?))
}

pub(super) async fn update_endpoint(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
    payload: Result<Json<EndpointChanges>, JsonRejection>,
) -> Result<Json<Endpoint>, AppError> {
    let Json(mut changes) = payload?;
    if let Some(name) = changes.name.take() {
        changes.name = Some(validate_name(name)?);
    }
    if let Some(status) = changes.response_status {
        validate_status(status)?;
    }
    if let Some(forward_url) = changes.forward_url.take() {
        changes.forward_url = Some(validate_forward_url(forward_url)?);
    }

    let endpoint = state.store.update_endpoint(id, owner_id, changes).await?;
    tracing::info!(endpoint_id = %endpoint.id, is_active = endpoint.is_active, "endpoint updated");
    Ok(Json(endpoint))
}

pub(super) async fn delete_endpoint(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_endpoint(id, owner_id).await?;
    tracing::info!(endpoint_id = %id, "endpoint deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_requests(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CapturedRequest>>, AppError> {
    let endpoint = owned_endpoint(&state, owner_id, id).await?;
    Ok(Json(
        state
            .store
            .list_captured_requests(endpoint.id, REQUEST_LIST_LIMIT)
            .await?,
    ))
}

pub(super) async fn get_request(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<CapturedRequestDetail>, AppError> {
    let request = state.replayer().owned_request(owner_id, id).await?;
    let forward_attempt = state.store.find_forward_attempt(request.id).await?;
    Ok(Json(CapturedRequestDetail {
        request,
        forward_attempt,
    }))
}

pub(super) async fn list_replays(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReplayAttempt>>, AppError> {
    let request = state.replayer().owned_request(owner_id, id).await?;
    Ok(Json(state.store.list_replay_attempts(request.id).await?))
}

pub(super) async fn replay_request(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> Result<Json<ReplayResponse>, AppError> {
    let Json(payload) = payload?;
    let outcome = state.replayer().replay(owner_id, id, payload).await?;
    Ok(Json(ReplayResponse::from(&outcome)))
}

async fn owned_endpoint(state: &AppState, owner_id: Uuid, id: Uuid) -> Result<Endpoint, AppError> {
    let endpoint = state.store.get_endpoint(id).await?;
    if endpoint.owner_id != owner_id {
        return Err(AppError::not_found(format!("endpoint not found: {id}")));
    }
    Ok(endpoint)
}

fn validate_name(name: String) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn validate_status(status: i32) -> Result<i32, AppError> {
    if (100..=599).contains(&status) {
        Ok(status)
    } else {
        Err(AppError::BadRequest(format!(
            "response_status must be between 100 and 599, got {status}"
        )))
    }
}

/// Blank URLs clear the target; anything else must parse.
fn validate_forward_url(forward_url: Option<String>) -> Result<Option<String>, AppError> {
    match forward_url.map(|url| url.trim().to_owned()) {
        Some(url) if url.is_empty() => Ok(None),
        Some(url) => {
            url::Url::parse(&url)
                .map_err(|err| AppError::BadRequest(format!("invalid forward_url: {err}")))?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}
