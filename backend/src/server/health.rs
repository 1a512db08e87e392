//! Liveness, readiness and metrics endpoints.

use super::state::AppState;
use crate::cache::RedisSesionCache;
use async_trait::async_trait;
use axum::{Json, extract::State, http::StatusCode, response::Response};
use evento_core::catedra::CatedraGateway;
use evento_postgres::PgPool;
use evento_web::handlers::render_metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Readiness check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Database connectivity
    pub database: bool,
    /// Session cache connectivity
    pub redis: bool,
    /// Cátedra reachability (reported, does not gate readiness)
    pub catedra: bool,
}

impl ReadinessResponse {
    /// Ready when the stores the backend cannot work without answer.
    #[must_use]
    pub const fn from_checks(database: bool, redis: bool, catedra: bool) -> Self {
        Self {
            ready: database && redis,
            database,
            redis,
            catedra,
        }
    }
}

/// Dependency checks behind `/ready`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Runs every check.
    async fn check(&self) -> ReadinessResponse;
}

/// Probe of the production dependencies.
pub struct InfraProbe {
    pool: PgPool,
    cache: RedisSesionCache,
    catedra: Arc<dyn CatedraGateway>,
}

impl InfraProbe {
    /// Creates the probe.
    #[must_use]
    pub fn new(pool: PgPool, cache: RedisSesionCache, catedra: Arc<dyn CatedraGateway>) -> Self {
        Self { pool, cache, catedra }
    }
}

#[async_trait]
impl ReadinessProbe for InfraProbe {
    async fn check(&self) -> ReadinessResponse {
        let (database, redis, catedra) = tokio::join!(
            evento_postgres::ping(&self.pool),
            self.cache.ping(),
            self.catedra.health(),
        );
        for (dependencia, error) in [
            ("database", database.as_ref().err().map(ToString::to_string)),
            ("redis", redis.as_ref().err().map(ToString::to_string)),
            ("catedra", catedra.as_ref().err().map(ToString::to_string)),
        ] {
            if let Some(error) = error {
                tracing::warn!(dependencia, error = %error, "Readiness check failed");
            }
        }
        ReadinessResponse::from_checks(database.is_ok(), redis.is_ok(), catedra.is_ok())
    }
}

/// Readiness check endpoint.
///
/// ```bash
/// curl http://localhost:8081/ready
/// # {"ready":true,"database":true,"redis":true,"catedra":true}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let response = state.readiness.check().await;
    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Prometheus scrape endpoint.
#[allow(clippy::unused_async)]
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    render_metrics(&state.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catedra_outage_does_not_gate_readiness() {
        assert!(ReadinessResponse::from_checks(true, true, false).ready);
        assert!(!ReadinessResponse::from_checks(false, true, true).ready);
        assert!(!ReadinessResponse::from_checks(true, false, true).ready);
    }
}
