use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    domain::{
        CapturedRequest, Endpoint, EndpointChanges, ForwardAttempt, NewCapturedRequest,
        NewEndpoint, NewForwardAttempt, NewReplayAttempt, ReplayAttempt,
    },
    errors::AppError,
};

pub mod memory;
pub mod pg;

/// Durable storage for endpoints, captures and delivery attempts.
///
/// Owner-scoped operations report a resource belonging to someone else as
/// `AppError::NotFound`.
#[async_trait]
pub trait HookStore: Send + Sync {
    async fn create_endpoint(&self, endpoint: NewEndpoint) -> Result<Endpoint, AppError>;
    async fn list_endpoints(&self, owner_id: Uuid) -> Result<Vec<Endpoint>, AppError>;
    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, AppError>;
    async fn find_endpoint_by_slug(&self, slug: &str) -> Result<Option<Endpoint>, AppError>;
    async fn update_endpoint(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Endpoint, AppError>;
    async fn delete_endpoint(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError>;

    async fn create_captured_request(
        &self,
        request: NewCapturedRequest,
    ) -> Result<CapturedRequest, AppError>;
    async fn get_captured_request(&self, id: Uuid) -> Result<CapturedRequest, AppError>;
    /// Newest first, at most `limit` rows.
    async fn list_captured_requests(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, AppError>;

    async fn create_forward_attempt(
        &self,
        attempt: NewForwardAttempt,
    ) -> Result<ForwardAttempt, AppError>;
    async fn find_forward_attempt(
        &self,
        request_id: Uuid,
    ) -> Result<Option<ForwardAttempt>, AppError>;

    async fn create_replay_attempt(
        &self,
        attempt: NewReplayAttempt,
    ) -> Result<ReplayAttempt, AppError>;
    async fn list_replay_attempts(&self, request_id: Uuid)
        -> Result<Vec<ReplayAttempt>, AppError>;
}
