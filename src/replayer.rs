use std::{sync::Arc, time::Instant};

use axum::http::Method;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::HookStore,
    domain::{
        CapturedRequest, FieldMap, NewReplayAttempt, ReplayAttempt, ReplayOutcome, ReplayRequest,
    },
    errors::AppError,
    outbound::{elapsed_ms, truncate_chars, OutboundClient, OutboundRequest},
};

pub const REPLAY_BODY_LIMIT: usize = 50_000;
pub const REPLAY_MARKER_HEADER: &str = "x-hook-lab-replay";
pub const ORIGINAL_REQUEST_HEADER: &str = "x-hook-lab-original-request-id";

/// Headers that only describe the original connection.
pub const HOP_BY_HOP_HEADERS: [&str; 3] = ["host", "connection", "content-length"];

/// Resends captured calls on owner request. Every call records a new
/// attempt; nothing is deduplicated.
#[derive(Clone)]
pub struct Replayer {
    store: Arc<dyn HookStore>,
    client: Arc<dyn OutboundClient>,
}

impl Replayer {
    pub fn new(store: Arc<dyn HookStore>, client: Arc<dyn OutboundClient>) -> Self {
        Self { store, client }
    }

    pub async fn replay(
        &self,
        owner_id: Uuid,
        request_id: Uuid,
        overrides: ReplayRequest,
    ) -> Result<ReplayOutcome, AppError> {
        let target_url = overrides
            .target_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::BadRequest("target_url is required".to_owned()))?
            .to_owned();
        url::Url::parse(&target_url)
            .map_err(|err| AppError::BadRequest(format!("invalid target_url: {err}")))?;

        let original = self.owned_request(owner_id, request_id).await?;

        let method_name = overrides.method.unwrap_or_else(|| original.method.clone());
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| AppError::BadRequest(format!("invalid method: {method_name}")))?;

        let headers = merge_headers(&original, overrides.headers.unwrap_or_default());
        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            overrides.body.or(original.body)
        };

        let started = Instant::now();
        let result = self
            .client
            .send(OutboundRequest {
                method: method.to_string(),
                url: target_url.clone(),
                headers: headers.clone(),
                body: body.clone(),
            })
            .await;
        let duration_ms = elapsed_ms(started);

        let (response_status, response_body, error_message) = match result {
            Ok(response) => {
                tracing::info!(
                    %request_id,
                    target_url = %target_url,
                    response_status = response.status,
                    duration_ms,
                    "replayed captured request"
                );
                (
                    Some(i32::from(response.status)),
                    Some(truncate_chars(response.body, REPLAY_BODY_LIMIT)),
                    None,
                )
            }
            Err(err) => {
                tracing::warn!(
                    %request_id,
                    target_url = %target_url,
                    duration_ms,
                    error = %err,
                    "replay failed"
                );
                (None, None, Some(err.to_string()))
            }
        };

        let attempt = NewReplayAttempt {
            request_id,
            target_url,
            method: method.to_string(),
            headers,
            body,
            response_status,
            response_body,
            duration_ms,
            error_message,
        };

        // The call already went out; a failed write must not hide its result.
        match self.store.create_replay_attempt(attempt.clone()).await {
            Ok(stored) => Ok(ReplayOutcome {
                attempt: stored,
                recorded: true,
            }),
            Err(err) => {
                tracing::error!(%request_id, error = %err, "failed to record replay attempt");
                Ok(ReplayOutcome {
                    attempt: unsaved(attempt),
                    recorded: false,
                })
            }
        }
    }

    /// Loads a captured request, reporting requests of other owners as missing.
    pub async fn owned_request(
        &self,
        owner_id: Uuid,
        request_id: Uuid,
    ) -> Result<CapturedRequest, AppError> {
        let request = self.store.get_captured_request(request_id).await?;
        let endpoint = self.store.get_endpoint(request.endpoint_id).await?;
        if endpoint.owner_id != owner_id {
            let message = format!("request not found: {request_id}");
            return Err(AppError::not_found(message));
        }
        Ok(request)
    }
}

fn unsaved(attempt: NewReplayAttempt) -> ReplayAttempt {
    ReplayAttempt {
        id: Uuid::new_v4(),
        request_id: attempt.request_id,
        target_url: attempt.target_url,
        method: attempt.method,
        headers: attempt.headers,
        body: attempt.body,
        response_status: attempt.response_status,
        response_body: attempt.response_body,
        duration_ms: attempt.duration_ms,
        error_message: attempt.error_message,
        created_at: Utc::now(),
    }
}

/// Original headers, then overrides, then replay markers; later layers win
/// regardless of header-name case. Hop-by-hop headers are dropped.
pub fn merge_headers(original: &CapturedRequest, overrides: FieldMap) -> FieldMap {
    let mut merged = original.headers.clone();
    let injected = [
        (REPLAY_MARKER_HEADER.to_owned(), "true".to_owned()),
        (ORIGINAL_REQUEST_HEADER.to_owned(), original.id.to_string()),
    ];
    for (name, value) in overrides.into_iter().chain(injected) {
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        merged.insert(name, value);
    }
    merged.retain(|name, _| {
        !HOP_BY_HOP_HEADERS
            .iter()
            .any(|hop| name.eq_ignore_ascii_case(hop))
    });
    merged
}
