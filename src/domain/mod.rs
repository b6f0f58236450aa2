use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Flattened header or query map, one string value per key.
pub type FieldMap = BTreeMap<String, String>;

pub const DEFAULT_RESPONSE_STATUS: i32 = 200;
pub const DEFAULT_RESPONSE_BODY: &str = r#"{"success": true}"#;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Endpoint {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub forward_url: Option<String>,
    pub response_status: i32,
    pub response_body: String,
    #[sqlx(json)]
    pub response_headers: FieldMap,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub owner_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub forward_url: Option<String>,
    pub response_status: i32,
    pub response_body: String,
    pub response_headers: FieldMap,
    pub is_active: bool,
}

/// Partial update of an endpoint. `None` leaves a field untouched; the
/// nested options distinguish "clear" (`Some(None)`) from "keep".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub forward_url: Option<Option<String>>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub response_headers: Option<FieldMap>,
    pub is_active: Option<bool>,
}

impl EndpointChanges {
    pub fn apply(self, endpoint: &mut Endpoint) {
        if let Some(name) = self.name {
            endpoint.name = name;
        }
        if let Some(description) = self.description {
            endpoint.description = description;
        }
        if let Some(forward_url) = self.forward_url {
            endpoint.forward_url = forward_url;
        }
        if let Some(status) = self.response_status {
            endpoint.response_status = status;
        }
        if let Some(body) = self.response_body {
            endpoint.response_body = body;
        }
        if let Some(headers) = self.response_headers {
            endpoint.response_headers = headers;
        }
        if let Some(is_active) = self.is_active {
            endpoint.is_active = is_active;
        }
        endpoint.updated_at = Utc::now();
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub forward_url: Option<String>,
    #[serde(default)]
    pub response_status: Option<i32>,
    #[serde(default)]
    pub response_body: Option<String>,
    #[serde(default)]
    pub response_headers: Option<FieldMap>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Body of a captured call. JSON that fails to parse is kept as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedBody {
    Raw(String),
    Json {
        raw: String,
        parsed: serde_json::Value,
    },
}

impl CapturedBody {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(parsed) => Self::Json { raw: text, parsed },
            Err(_) => Self::Raw(text),
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Raw(raw) | Self::Json { raw, .. } => raw,
        }
    }

    pub fn parsed(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Raw(_) => None,
            Self::Json { parsed, .. } => Some(parsed),
        }
    }

    pub fn into_parts(self) -> (String, Option<serde_json::Value>) {
        match self {
            Self::Raw(raw) => (raw, None),
            Self::Json { raw, parsed } => (raw, Some(parsed)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCapturedRequest {
    pub endpoint_id: Uuid,
    pub method: String,
    pub path: String,
    pub query_params: FieldMap,
    pub headers: FieldMap,
    pub body: Option<CapturedBody>,
    pub source_ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CapturedRequest {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub method: String,
    pub path: String,
    #[sqlx(json)]
    pub query_params: FieldMap,
    #[sqlx(json)]
    pub headers: FieldMap,
    pub body: Option<String>,
    pub body_parsed: Option<serde_json::Value>,
    pub source_ip: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "forward_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ForwardStatus {
    Success,
    Failed,
}

impl ForwardStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewForwardAttempt {
    pub request_id: Uuid,
    pub forward_url: String,
    pub status: ForwardStatus,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForwardAttempt {
    pub id: Uuid,
    pub request_id: Uuid,
    pub forward_url: String,
    pub status: ForwardStatus,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReplayAttempt {
    pub request_id: Uuid,
    pub target_url: String,
    pub method: String,
    pub headers: FieldMap,
    pub body: Option<String>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReplayAttempt {
    pub id: Uuid,
    pub request_id: Uuid,
    pub target_url: String,
    pub method: String,
    #[sqlx(json)]
    pub headers: FieldMap,
    pub body: Option<String>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplayRequest {
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<FieldMap>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Result of one replay. `recorded` is false when the delivery happened but
/// the attempt row could not be written; `attempt.id` is then unsaved.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub attempt: ReplayAttempt,
    pub recorded: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub replay_id: Uuid,
    pub status: Option<i32>,
    pub body: Option<String>,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub recorded: bool,
}

impl From<&ReplayOutcome> for ReplayResponse {
    fn from(outcome: &ReplayOutcome) -> Self {
        let attempt = &outcome.attempt;
        Self {
            replay_id: attempt.id,
            status: attempt.response_status,
            body: attempt.response_body.clone(),
            duration_ms: attempt.duration_ms,
            error: attempt.error_message.clone(),
            recorded: outcome.recorded,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CapturedRequestDetail {
    #[serde(flatten)]
    pub request: CapturedRequest,
    pub forward_attempt: Option<ForwardAttempt>,
}
