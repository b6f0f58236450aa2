//! Outbound HTTP calls made on behalf of forwards and replays.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::FieldMap;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: FieldMap,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Cuts `text` to at most `limit` characters.
pub fn truncate_chars(mut text: String, limit: usize) -> String {
    if let Some((index, _)) = text.char_indices().nth(limit) {
        text.truncate(index);
    }
    text
}

/// Milliseconds elapsed since `started`, saturating.
pub fn elapsed_ms(started: Instant) -> i64 {
    let millis = started.elapsed().as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    #[error("invalid header {0}")]
    InvalidHeader(String),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Performs exactly one HTTP call. Network failures are errors; any HTTP
/// status, including 4xx/5xx, is a response.
#[async_trait]
pub trait OutboundClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError>;
}

#[derive(Clone)]
pub struct ReqwestOutbound {
    client: reqwest::Client,
}

impl ReqwestOutbound {
    pub fn new(timeout: Option<Duration>) -> Result<Self, OutboundError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OutboundClient for ReqwestOutbound {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, OutboundError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| OutboundError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| OutboundError::InvalidHeader(name.clone()))?;
            let header_value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| OutboundError::InvalidHeader(format!("{name}: {value}")))?;
            builder = builder.header(header_name, header_value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(OutboundResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn direct_client() -> ReqwestOutbound {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ReqwestOutbound::from_client(client)
    }

    #[tokio::test]
    async fn rejects_invalid_method_without_sending() {
        let client = direct_client();
        let result = client
            .send(OutboundRequest {
                method: "BAD METHOD".to_owned(),
                url: "http://127.0.0.1:9".to_owned(),
                headers: BTreeMap::new(),
                body: None,
            })
            .await;

        assert!(matches!(result, Err(OutboundError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn rejects_invalid_header_name() {
        let client = direct_client();
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_owned(), "x".to_owned());
        let result = client
            .send(OutboundRequest {
                method: "POST".to_owned(),
                url: "http://127.0.0.1:9".to_owned(),
                headers,
                body: None,
            })
            .await;

        assert!(matches!(result, Err(OutboundError::InvalidHeader(_))));
    }

    #[test]
    fn truncates_on_character_boundaries() {
        assert_eq!(truncate_chars("héllo".to_owned(), 2), "hé");
        assert_eq!(truncate_chars("abc".to_owned(), 3), "abc");
        assert_eq!(truncate_chars("abc".to_owned(), 10), "abc");
        let long = truncate_chars("x".repeat(12_000), 10_000);
        assert_eq!(long.chars().count(), 10_000);
    }

    #[test]
    fn only_2xx_counts_as_success() {
        let ok = OutboundResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = OutboundResponse {
            status: 302,
            body: String::new(),
        };
        let error = OutboundResponse {
            status: 500,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!error.is_success());
    }
}
