//! Owner authentication for the management API.
//!
//! The public capture route never goes through this module.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::errors::AppError;

/// Resolves the calling owner from request headers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn owner(&self, headers: &HeaderMap) -> Result<Uuid, AppError>;
}

/// Maps `Authorization: Bearer <token>` through a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Uuid>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, Uuid>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn owner(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        let raw = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_owned()))?;
        let token = raw.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("expected 'Bearer <token>' authorization".to_owned())
        })?;

        self.tokens
            .get(token.trim())
            .copied()
            .ok_or_else(|| AppError::Unauthorized("invalid token".to_owned()))
    }
}

/// The authenticated owner of the current management request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    Arc<dyn Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<dyn Authenticator>::from_ref(state);
        authenticator.owner(&parts.headers).await.map(Owner)
    }
}
