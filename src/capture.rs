//! Normalization of inbound hook calls into storable records.

use std::{collections::btree_map::Entry, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Uri},
};

use crate::{
    db::HookStore,
    domain::{CapturedBody, CapturedRequest, FieldMap, NewCapturedRequest},
    errors::AppError,
};

pub const UNKNOWN_SOURCE_IP: &str = "unknown";

/// Observer invoked when a capture could not be persisted.
pub type PersistFailureHook = Arc<dyn Fn(&AppError) + Send + Sync>;

/// A capture that was dropped; the failure has already been logged.
#[derive(Debug)]
pub struct PersistFailed;

/// Query parameters; the last value wins for repeated keys.
pub fn query_params(uri: &Uri) -> FieldMap {
    uri.query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// One entry per header name; repeated headers are joined with `", "`.
pub fn flatten_headers(headers: &HeaderMap) -> FieldMap {
    let mut flat = FieldMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match flat.entry(name.as_str().to_owned()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }
    flat
}

pub fn source_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_SOURCE_IP)
        .to_owned()
}

/// Reads the body for methods that carry one. Read failures, oversized and
/// empty bodies all yield `None`.
pub async fn read_body(method: &Method, body: Body, limit: usize) -> Option<CapturedBody> {
    if method == Method::GET || method == Method::HEAD {
        return None;
    }
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "capture body unreadable");
            return None;
        }
    };
    if bytes.is_empty() {
        return None;
    }
    Some(CapturedBody::from_text(
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}

/// Writes the capture without retrying. Failures are logged and reported to
/// the hook instead of propagating.
pub async fn persist(
    store: &dyn HookStore,
    request: NewCapturedRequest,
    on_failure: Option<&PersistFailureHook>,
) -> Result<CapturedRequest, PersistFailed> {
    let endpoint_id = request.endpoint_id;
    match store.create_captured_request(request).await {
        Ok(stored) => Ok(stored),
        Err(err) => {
            tracing::error!(%endpoint_id, error = %err, "failed to persist captured request");
            if let Some(hook) = on_failure {
                hook(&err);
            }
            Err(PersistFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn query_params_keep_last_duplicate() {
        let uri: Uri = "/hook/x?a=1&b=two%20words&a=3".parse().unwrap();
        let params = query_params(&uri);
        assert_eq!(params["a"], "3");
        assert_eq!(params["b"], "two words");
        assert!(query_params(&"/hook/x".parse().unwrap()).is_empty());
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let flat = flatten_headers(&headers);
        assert_eq!(flat["x-tag"], "a, b");
        assert_eq!(flat["content-type"], "text/plain");
    }

    #[test]
    fn source_ip_prefers_forwarded_for_then_real_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(source_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(source_ip(&headers), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(source_ip(&headers), "203.0.113.7");
    }

    #[tokio::test]
    async fn body_is_skipped_for_get_and_head() {
        let get = read_body(&Method::GET, Body::from("{}"), 1024).await;
        let head = read_body(&Method::HEAD, Body::from("{}"), 1024).await;
        assert!(get.is_none());
        assert!(head.is_none());
    }

    #[tokio::test]
    async fn body_parse_failure_keeps_raw_text() {
        let body = read_body(&Method::POST, Body::from("a=1&b=2"), 1024)
            .await
            .unwrap();
        assert_eq!(body, CapturedBody::Raw("a=1&b=2".to_owned()));

        let json_body = read_body(&Method::PUT, Body::from(r#"{"ok":true}"#), 1024)
            .await
            .unwrap();
        assert_eq!(json_body.parsed(), Some(&json!({"ok": true})));
    }

    #[tokio::test]
    async fn oversized_or_empty_body_is_dropped() {
        let oversized = read_body(&Method::POST, Body::from("0123456789"), 4).await;
        assert!(oversized.is_none());
        assert!(read_body(&Method::POST, Body::empty(), 4).await.is_none());
    }
}
