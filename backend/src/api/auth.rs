//! Login endpoint and the caller extractors.

use crate::server::state::AppState;
use axum::{Json, async_trait, extract::{FromRequestParts, State}, http::request::Parts};
use evento_core::types::Usuario;
use evento_web::{AppError, BearerToken, JsonBody};
use serde::{Deserialize, Serialize};

/// Login credentials.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login
    pub username: String,
    /// Plain password
    pub password: String,
    /// Accepted for client compatibility; tokens always live the configured TTL
    #[serde(default)]
    pub remember_me: bool,
}

/// Issued token.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtToken {
    /// Bearer token
    pub id_token: String,
}

/// Exchange credentials for a bearer token.
///
/// ```bash
/// curl -X POST http://localhost:8081/api/authenticate \
///   -H "Content-Type: application/json" \
///   -d '{"username": "user", "password": "user"}'
/// ```
pub async fn authenticate(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<JwtToken>, AppError> {
    let id_token = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(JwtToken { id_token }))
}

// ============================================================================
// Extractors
// ============================================================================

/// The active user behind the request's bearer token.
///
/// Rejects with 401 when the token is missing, malformed or expired.
#[derive(Debug, Clone)]
pub struct Autenticado(pub Usuario);

#[async_trait]
impl FromRequestParts<AppState> for Autenticado {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let usuario = state.auth.autenticar(&token).await?;
        Ok(Self(usuario))
    }
}

/// An authenticated administrator. 403 for other users.
#[derive(Debug, Clone)]
pub struct Admin(pub Usuario);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Autenticado(usuario) = Autenticado::from_request_parts(parts, state).await?;
        if !usuario.admin {
            tracing::info!(usuario = %usuario.id, "Admin endpoint refused");
            return Err(AppError::forbidden("Administrator role required"));
        }
        Ok(Self(usuario))
    }
}
