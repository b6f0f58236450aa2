use std::{sync::Arc, time::Instant};

use uuid::Uuid;

use crate::{
    db::HookStore,
    domain::{FieldMap, ForwardAttempt, ForwardStatus, NewForwardAttempt},
    outbound::{elapsed_ms, truncate_chars, OutboundClient, OutboundRequest},
};

pub const FORWARD_BODY_LIMIT: usize = 10_000;
pub const REQUEST_ID_HEADER: &str = "x-hook-lab-request-id";
pub const FORWARDED_FROM_HEADER: &str = "x-hook-lab-forwarded-from";

/// A captured call to relay to its endpoint's forward target.
#[derive(Debug, Clone)]
pub struct ForwardJob {
    pub request_id: Uuid,
    pub slug: String,
    pub target_url: String,
    pub method: String,
    pub headers: FieldMap,
    pub body: Option<String>,
}

/// Relays captured calls synchronously and records one attempt per call.
///
/// Headers go out as captured plus the two correlation headers; unlike
/// replays, `host` and `connection` are left in place. Body framing is
/// rewritten to describe the body actually sent. No retries are made.
#[derive(Clone)]
pub struct Forwarder {
    store: Arc<dyn HookStore>,
    client: Arc<dyn OutboundClient>,
}

impl Forwarder {
    pub fn new(store: Arc<dyn HookStore>, client: Arc<dyn OutboundClient>) -> Self {
        Self { store, client }
    }

    /// Never fails towards the caller. `None` means the attempt itself could
    /// not be stored; that failure is logged.
    pub async fn forward(&self, job: ForwardJob) -> Option<ForwardAttempt> {
        let mut headers = reframe(job.headers, job.body.as_deref());
        headers.insert(REQUEST_ID_HEADER.to_owned(), job.request_id.to_string());
        headers.insert(FORWARDED_FROM_HEADER.to_owned(), job.slug.clone());

        let started = Instant::now();
        let result = self
            .client
            .send(OutboundRequest {
                method: job.method,
                url: job.target_url.clone(),
                headers,
                body: job.body,
            })
            .await;
        let duration_ms = elapsed_ms(started);

        let attempt = match result {
            Ok(response) => {
                let status = if response.is_success() {
                    ForwardStatus::Success
                } else {
                    ForwardStatus::Failed
                };
                tracing::info!(
                    request_id = %job.request_id,
                    target_url = %job.target_url,
                    response_status = response.status,
                    duration_ms,
                    status = status.as_str(),
                    "forwarded captured request"
                );
                NewForwardAttempt {
                    request_id: job.request_id,
                    forward_url: job.target_url,
                    status,
                    response_status: Some(i32::from(response.status)),
                    response_body: Some(truncate_chars(response.body, FORWARD_BODY_LIMIT)),
                    duration_ms,
                    error_message: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %job.request_id,
                    target_url = %job.target_url,
                    duration_ms,
                    error = %err,
                    "forward failed"
                );
                NewForwardAttempt {
                    request_id: job.request_id,
                    forward_url: job.target_url,
                    status: ForwardStatus::Failed,
                    response_status: None,
                    response_body: None,
                    duration_ms,
                    error_message: Some(err.to_string()),
                }
            }
        };

        match self.store.create_forward_attempt(attempt).await {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::error!(
                    request_id = %job.request_id,
                    error = %err,
                    "failed to record forward attempt"
                );
                None
            }
        }
    }
}

/// Replaces the captured `content-length`/`transfer-encoding` with a length
/// matching `body`. Without a body neither header is sent.
pub fn reframe(mut headers: FieldMap, body: Option<&str>) -> FieldMap {
    headers.retain(|name, _| {
        !name.eq_ignore_ascii_case("content-length")
            && !name.eq_ignore_ascii_case("transfer-encoding")
    });
    if let Some(body) = body {
        headers.insert("content-length".to_owned(), body.len().to_string());
    }
    headers
}
