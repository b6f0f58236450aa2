use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use crate::{
    db::HookStore,
    domain::{
        CapturedRequest, Endpoint, EndpointChanges, ForwardAttempt, NewCapturedRequest,
        NewEndpoint, NewForwardAttempt, NewReplayAttempt, ReplayAttempt,
    },
    errors::AppError,
};

const ENDPOINT_COLUMNS: &str = "id, owner_id, slug, name, description, forward_url, \
     response_status, response_body, response_headers, is_active, created_at, updated_at";
const REQUEST_COLUMNS: &str = "id, endpoint_id, method, path, query_params, headers, body, \
     body_parsed, source_ip, received_at";
const FORWARD_COLUMNS: &str = "id, request_id, forward_url, status, response_status, \
     response_body, duration_ms, error_message, created_at";
const REPLAY_COLUMNS: &str = "id, request_id, target_url, method, headers, body, \
     response_status, response_body, duration_ms, error_message, created_at";

#[derive(Clone)]
pub struct PgHookStore {
    pool: PgPool,
}

impl PgHookStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl HookStore for PgHookStore {
    async fn create_endpoint(&self, endpoint: NewEndpoint) -> Result<Endpoint, AppError> {
        let created = sqlx::query_as::<_, Endpoint>(&format!(
            r#"
            INSERT INTO endpoints (id, owner_id, slug, name, description, forward_url,
                                   response_status, response_body, response_headers, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ENDPOINT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(endpoint.owner_id)
        .bind(endpoint.slug)
        .bind(endpoint.name)
        .bind(endpoint.description)
        .bind(endpoint.forward_url)
        .bind(endpoint.response_status)
        .bind(endpoint.response_body)
        .bind(Json(endpoint.response_headers))
        .bind(endpoint.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list_endpoints(&self, owner_id: Uuid) -> Result<Vec<Endpoint>, AppError> {
        let endpoints = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(endpoints)
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, AppError> {
        let endpoint = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        endpoint.ok_or_else(|| AppError::not_found(format!("endpoint not found: {id}")))
    }

    async fn find_endpoint_by_slug(&self, slug: &str) -> Result<Option<Endpoint>, AppError> {
        let endpoint = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(endpoint)
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Endpoint, AppError> {
        let mut endpoint = self.get_endpoint(id).await?;
        if endpoint.owner_id != owner_id {
            return Err(AppError::not_found(format!("endpoint not found: {id}")));
        }
        changes.apply(&mut endpoint);

        let updated = sqlx::query_as::<_, Endpoint>(&format!(
            r#"
            UPDATE endpoints
            SET name = $3, description = $4, forward_url = $5, response_status = $6,
                response_body = $7, response_headers = $8, is_active = $9, updated_at = $10
            WHERE id = $1 AND owner_id = $2
            RETURNING {ENDPOINT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(endpoint.name)
        .bind(endpoint.description)
        .bind(endpoint.forward_url)
        .bind(endpoint.response_status)
        .bind(endpoint.response_body)
        .bind(Json(endpoint.response_headers))
        .bind(endpoint.is_active)
        .bind(endpoint.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::not_found(format!("endpoint not found: {id}")))
    }

    async fn delete_endpoint(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM endpoints WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("endpoint not found: {id}")));
        }
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

        let created = sqlx::query_as::<_, CapturedRequest>(&format!(
            r#"
            INSERT INTO captured_requests (id, endpoint_id, method, path, query_params, headers,
                                           body, body_parsed, source_ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.endpoint_id)
        .bind(request.method)
        .bind(request.path)
        .bind(Json(request.query_params))
        .bind(Json(request.headers))
        .bind(body)
        .bind(body_parsed)
        .bind(request.source_ip)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_captured_request(&self, id: Uuid) -> Result<CapturedRequest, AppError> {
        let request = sqlx::query_as::<_, CapturedRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM captured_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        request.ok_or_else(|| AppError::not_found(format!("request not found: {id}")))
    }

    async fn list_captured_requests(
        &self,
        endpoint_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, AppError> {
        let requests = sqlx::query_as::<_, CapturedRequest>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM captured_requests
            WHERE endpoint_id = $1
            ORDER BY received_at DESC
            LIMIT $2
            "#
        ))
        .bind(endpoint_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn create_forward_attempt(
        &self,
        attempt: NewForwardAttempt,
    ) -> Result<ForwardAttempt, AppError> {
        let created = sqlx::query_as::<_, ForwardAttempt>(&format!(
            r#"
            INSERT INTO forward_attempts (id, request_id, forward_url, status, response_status,
                                          response_body, duration_ms, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {FORWARD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(attempt.request_id)
        .bind(attempt.forward_url)
        .bind(attempt.status)
        .bind(attempt.response_status)
        .bind(attempt.response_body)
        .bind(attempt.duration_ms)
        .bind(attempt.error_message)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_forward_attempt(
        &self,
        request_id: Uuid,
    ) -> Result<Option<ForwardAttempt>, AppError> {
        let attempt = sqlx::query_as::<_, ForwardAttempt>(&format!(
            "SELECT {FORWARD_COLUMNS} FROM forward_attempts WHERE request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn create_replay_attempt(
        &self,
        attempt: NewReplayAttempt,
    ) -> Result<ReplayAttempt, AppError> {
        let created = sqlx::query_as::<_, ReplayAttempt>(&format!(
            r#"
            INSERT INTO replay_attempts (id, request_id, target_url, method, headers, body,
                                         response_status, response_body, duration_ms, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {REPLAY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(attempt.request_id)
        .bind(attempt.target_url)
        .bind(attempt.method)
        .bind(Json(attempt.headers))
        .bind(attempt.body)
        .bind(attempt.response_status)
        .bind(attempt.response_body)
        .bind(attempt.duration_ms)
        .bind(attempt.error_message)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list_replay_attempts(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ReplayAttempt>, AppError> {
        let attempts = sqlx::query_as::<_, ReplayAttempt>(&format!(
            r#"
            SELECT {REPLAY_COLUMNS}
            FROM replay_attempts
            WHERE request_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }
}
