use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::HookStore,
    domain::{
        CapturedRequest, Endpoint, EndpointChanges, ForwardAttempt, NewCapturedRequest,
        NewEndpoint, NewForwardAttempt, NewReplayAttempt, ReplayAttempt,
    },
    errors::AppError,
};

#[derive(Default)]
struct Tables {
    endpoints: Vec<Endpoint>,
    requests: Vec<CapturedRequest>,
    forwards: Vec<ForwardAttempt>,
    replays: Vec<ReplayAttempt>,
}

/// In-process store used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryHookStore {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl HookStore for MemoryHookStore {
    async fn create_endpoint(&self, endpoint: NewEndpoint) -> Result<Endpoint, AppError> {
        let mut tables = self.tables.write().await;
        if tables.endpoints.iter().any(|e| e.slug == endpoint.slug) {
            return Err(AppError::Internal(format!(
                "duplicate endpoint slug: {}",
                endpoint.slug
            )));
        }
        let now = chrono::Utc::now();
        let stored = Endpoint {
            id: Uuid::new_v4(),
            owner_id: endpoint.owner_id,
            slug: endpoint.slug,
            name: endpoint.name,
            description: endpoint.description,
            forward_url: endpoint.forward_url,
            response_status: endpoint.response_status,
            response_body: endpoint.response_body,
            response_headers: endpoint.response_headers,
            is_active: endpoint.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.endpoints.push(stored.clone());
        Ok(stored)
    }

    async fn list_endpoints(&self, owner_id: Uuid) -> Result<Vec<Endpoint>, AppError> {
        let mut endpoints: Vec<_> = self
            .tables
            .read()
            .await
            .endpoints
            .iter()
            .filter(|endpoint| endpoint.owner_id == owner_id)
            .cloned()
            .collect();
        endpoints.reverse();
        endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(endpoints)
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, AppError> {
        let maybe = self
            .tables
            .read()
            .await
            .endpoints
            .iter()
            .find(|endpoint| endpoint.id == id)
            .cloned();

        maybe.ok_or_else(|| AppError::not_found(format!("endpoint not found: {id}")))
    }

    async fn find_endpoint_by_slug(&self, slug: &str) -> Result<Option<Endpoint>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .endpoints
            .iter()
            .find(|endpoint| endpoint.slug == slug)
            .cloned())
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Endpoint, AppError> {
        let mut tables = self.tables.write().await;
        let endpoint = tables
            .endpoints
            .iter_mut()
            .find(|endpoint| endpoint.id == id && endpoint.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("endpoint not found: {id}")))?;
        changes.apply(endpoint);
        Ok(endpoint.clone())
    }

    async fn delete_endpoint(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.endpoints.len();
        tables
            .endpoints
            .retain(|endpoint| !(endpoint.id == id && endpoint.owner_id == owner_id));
        if tables.endpoints.len() == before {
            return Err(AppError::not_found(format!("endpoint not found: {id}")));
        }

        let removed: Vec<Uuid> = tables
            .requests
            .iter()
            .filter(|request| request.endpoint_id == id)
            .map(|request| request.id)
            .collect();
        tables.requests.retain(|request| request.endpoint_id != id);
        tables
            .forwards
            .retain(|attempt| !removed.contains(&attempt.request_id));
        tables
            .replays
            .retain(|attempt| !removed.contains(&attempt.request_id));
        Ok(())
    }

    async fn create_captured_request(
        &self,
        request: NewCapturedRequest,
    ) -> Result<CapturedRequest, AppError> {
        let (body, body_parsed) = match request.body {
            Some(body) => {
                let (raw, parsed) = body.into_parts();
                (Some(raw), parsed)
            }
            None => (None, None),
        };
        let stored = CapturedRequest {
            id: Uuid::new_v4(),
            endpoint_id: request.endpoint_id,
            method: request.method,
            path: request.path,
            query_params: request.query_params,
            headers: request.headers,
            body,
            body_parsed,
            source_ip: request.source_ip,
            received_at: chrono::Utc::now(),
        };
        self.tables.write().await.requests.push(stored.clone());
        Ok(stored)
    }

    async fn get_captured_request(&self, id: Uuid) -> Result<CapturedRequest, AppError> {
        let maybe = self
            .tables
            .read()
            .await
            .requests
            .iter()
            .find(|request| request.id == id)
            .cloned();

        maybe.ok_or_else(|| AppError::not_found(format!("request not found: {id}")))
    }

    async fn list_captured_requests(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, AppError> {
        let mut requests: Vec<_> = self
            .tables
            .read()
            .await
            .requests
            .iter()
            .filter(|request| request.endpoint_id == endpoint_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reverse it so
        // the latest insert still comes first.
        requests.reverse();
        requests.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        requests.truncate(limit);
        Ok(requests)
    }

    async fn create_forward_attempt(
        &self,
        attempt: NewForwardAttempt,
    ) -> Result<ForwardAttempt, AppError> {
        let stored = ForwardAttempt {
            id: Uuid::new_v4(),
            request_id: attempt.request_id,
            forward_url: attempt.forward_url,
            status: attempt.status,
            response_status: attempt.response_status,
            response_body: attempt.response_body,
            duration_ms: attempt.duration_ms,
            error_message: attempt.error_message,
            created_at: chrono::Utc::now(),
        };
        self.tables.write().await.forwards.push(stored.clone());
        Ok(stored)
    }

    async fn find_forward_attempt(
        &self,
        request_id: Uuid,
    ) -> Result<Option<ForwardAttempt>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .forwards
            .iter()
            .find(|attempt| attempt.request_id == request_id)
            .cloned())
    }

    async fn create_replay_attempt(
        &self,
        attempt: NewReplayAttempt,
    ) -> Result<ReplayAttempt, AppError> {
        let stored = ReplayAttempt {
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
            created_at: chrono::Utc::now(),
        };
        self.tables.write().await.replays.push(stored.clone());
        Ok(stored)
    }

    async fn list_replay_attempts(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ReplayAttempt>, AppError> {
        let mut replays: Vec<_> = self
            .tables
            .read()
            .await
            .replays
            .iter()
            .filter(|attempt| attempt.request_id == request_id)
            .cloned()
            .collect();
        replays.reverse();
        replays.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(replays)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{CapturedBody, DEFAULT_RESPONSE_BODY, DEFAULT_RESPONSE_STATUS};

    fn new_endpoint(owner_id: Uuid, slug: &str) -> NewEndpoint {
        NewEndpoint {
            owner_id,
            slug: slug.to_owned(),
            name: "test".to_owned(),
            description: None,
            forward_url: None,
            response_status: DEFAULT_RESPONSE_STATUS,
            response_body: DEFAULT_RESPONSE_BODY.to_owned(),
            response_headers: BTreeMap::new(),
            is_active: true,
        }
    }

    fn new_request(endpoint_id: Uuid, path: &str) -> NewCapturedRequest {
        NewCapturedRequest {
            endpoint_id,
            method: "POST".to_owned(),
            path: path.to_owned(),
            query_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: Some(CapturedBody::from_text("{\"n\":1}".to_owned())),
            source_ip: "unknown".to_owned(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_slugs() {
        let store = MemoryHookStore::default();
        let owner = Uuid::new_v4();
        let first = store.create_endpoint(new_endpoint(owner, "abc")).await;
        let second = store.create_endpoint(new_endpoint(owner, "abc")).await;
        assert!(first.is_ok());
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn owner_scoping_hides_foreign_endpoints() {
        let store = MemoryHookStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let endpoint = store
            .create_endpoint(new_endpoint(owner, "abc"))
            .await
            .unwrap();

        assert!(store.list_endpoints(stranger).await.unwrap().is_empty());
        assert!(matches!(
            store
                .update_endpoint(endpoint.id, stranger, EndpointChanges::default())
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_endpoint(endpoint.id, stranger).await,
            Err(AppError::NotFound(_))
        ));
        store.delete_endpoint(endpoint.id, owner).await.unwrap();
        assert!(store.find_endpoint_by_slug("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_endpoints_newest_first() {
        let store = MemoryHookStore::default();
        let owner = Uuid::new_v4();
        for slug in ["first", "second", "third"] {
            store
                .create_endpoint(new_endpoint(owner, slug))
                .await
                .unwrap();
        }

        let slugs: Vec<_> = store
            .list_endpoints(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|endpoint| endpoint.slug)
            .collect();
        assert_eq!(slugs, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn lists_captured_requests_newest_first_with_limit() {
        let store = MemoryHookStore::default();
        let endpoint = store
            .create_endpoint(new_endpoint(Uuid::new_v4(), "abc"))
            .await
            .unwrap();
        for n in 0..5 {
            store
                .create_captured_request(new_request(endpoint.id, &format!("/hook/abc/{n}")))
                .await
                .unwrap();
        }

        let listed = store.list_captured_requests(endpoint.id, 3).await.unwrap();
        let paths: Vec<_> = listed.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/hook/abc/4", "/hook/abc/3", "/hook/abc/2"]);
        assert_eq!(listed[0].body_parsed, Some(serde_json::json!({"n": 1})));
    }
}
