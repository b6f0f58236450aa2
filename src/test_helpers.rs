//! Shared fakes for the store and outbound ports.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{memory::MemoryHookStore, HookStore},
    domain::{
        CapturedRequest, Endpoint, EndpointChanges, ForwardAttempt, NewCapturedRequest,
        NewEndpoint, NewForwardAttempt, NewReplayAttempt, ReplayAttempt,
    },
    errors::AppError,
    outbound::{OutboundClient, OutboundError, OutboundRequest, OutboundResponse},
};

/// Outbound client that answers every call with a fixed response and keeps
/// the requests it was asked to send.
#[derive(Default)]
pub struct RecordingClient {
    status: u16,
    body: String,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl RecordingClient {
    pub fn responding(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl OutboundClient for RecordingClient {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        self.sent.lock().expect("sent lock").push(request);
        Ok(OutboundResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Memory store that can be told to fail captured-request or replay-attempt
/// inserts.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryHookStore,
    fail_captures: bool,
    fail_replays: bool,
}

impl FailingStore {
    pub fn failing_captures() -> Self {
        Self {
            fail_captures: true,
            ..Default::default()
        }
    }

    pub fn failing_replays() -> Self {
        Self {
            fail_replays: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl HookStore for FailingStore {
    async fn create_endpoint(&self, endpoint: NewEndpoint) -> Result<Endpoint, AppError> {
        self.inner.create_endpoint(endpoint).await
    }

    async fn list_endpoints(&self, owner_id: Uuid) -> Result<Vec<Endpoint>, AppError> {
        self.inner.list_endpoints(owner_id).await
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, AppError> {
        self.inner.get_endpoint(id).await
    }

    async fn find_endpoint_by_slug(&self, slug: &str) -> Result<Option<Endpoint>, AppError> {
        self.inner.find_endpoint_by_slug(slug).await
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Endpoint, AppError> {
        self.inner.update_endpoint(id, owner_id, changes).await
    }

    async fn delete_endpoint(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        self.inner.delete_endpoint(id, owner_id).await
    }

    async fn create_captured_request(
        &self,
        request: NewCapturedRequest,
    ) -> Result<CapturedRequest, AppError> {
        if self.fail_captures {
            return Err(AppError::Internal("store unavailable".to_owned()));
        }
        self.inner.create_captured_request(request).await
    }

    async fn get_captured_request(&self, id: Uuid) -> Result<CapturedRequest, AppError> {
        self.inner.get_captured_request(id).await
    }

    async fn list_captured_requests(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, AppError> {
        self.inner.list_captured_requests(endpoint_id, limit).await
    }

    async fn create_forward_attempt(
        &self,
        attempt: NewForwardAttempt,
    ) -> Result<ForwardAttempt, AppError> {
        self.inner.create_forward_attempt(attempt).await
    }

    async fn find_forward_attempt(
        &self,
        request_id: Uuid,
    ) -> Result<Option<ForwardAttempt>, AppError> {
        self.inner.find_forward_attempt(request_id).await
    }

    async fn create_replay_attempt(
        &self,
        attempt: NewReplayAttempt,
    ) -> Result<ReplayAttempt, AppError> {
        if self.fail_replays {
            return Err(AppError::Internal("store unavailable".to_owned()));
        }
        self.inner.create_replay_attempt(attempt).await
    }

    async fn list_replay_attempts(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ReplayAttempt>, AppError> {
        self.inner.list_replay_attempts(request_id).await
    }
}
