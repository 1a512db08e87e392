//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the id assigned by the correlation middleware
//! - [`BearerToken`]: the token of an `Authorization: Bearer` header
//! - [`JsonBody`], [`PathParam`]: `Json` and `Path` whose rejections render
//!   as [`AppError`]

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use std::fmt;
use uuid::Uuid;

const MAX_CORRELATION_ID_LEN: usize = 128;

/// Correlation ID for request tracing.
///
/// Taken from the request extensions when the middleware ran, otherwise read
/// from the `X-Correlation-ID` header or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// A fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The caller's id when it is short visible ASCII, otherwise a fresh one.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| {
                !s.is_empty()
                    && s.len() <= MAX_CORRELATION_ID_LEN
                    && s.bytes().all(|b| b.is_ascii_graphic())
            })
            .map_or_else(Self::generate, |s| Self(s.to_string()))
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_else(|| Self::from_headers(&parts.headers)))
    }
}

/// Token of an `Authorization: Bearer <token>` header.
///
/// Rejects with 401 when the header is missing or uses another scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    fn parse(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty())
            .then(|| Self(token.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::parse(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Missing or malformed bearer token"))
    }
}

/// JSON request body that fails with a `{code, message}` 400.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Path parameters that fail with a `{code, message}` 400.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);
