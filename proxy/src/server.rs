//! HTTP surface of the proxy.

use crate::asientos::SeatStore;
use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use evento_runtime::metrics::MetricsHandle;
use evento_web::handlers::{health_check, render_metrics};
use evento_web::{AppError, PathParam, correlation_id_layer};
use std::sync::Arc;

/// Shared state of the proxy handlers.
#[derive(Clone)]
pub struct AppState {
    /// Seat map source
    pub asientos: Arc<dyn SeatStore>,
    /// Prometheus handle rendered at `/metrics`
    pub metrics: MetricsHandle,
}

/// Build the proxy router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/proxy/asientos/:evento_id", get(asientos))
        .layer(correlation_id_layer())
        .with_state(state)
}

/// Seat map of a cátedra event, as cátedra published it.
///
/// ```bash
/// curl http://localhost:8082/api/proxy/asientos/501
/// ```
async fn asientos(
    State(state): State<AppState>,
    PathParam(evento_id): PathParam<i64>,
) -> Result<Response, AppError> {
    match state.asientos.asientos(evento_id).await {
        Ok(Some(raw)) => Ok(([(header::CONTENT_TYPE, "application/json")], raw).into_response()),
        Ok(None) => {
            tracing::debug!(evento_id, "No seat map published");
            Err(AppError::not_found("Seat map of event", evento_id))
        },
        Err(e) => Err(AppError::internal_from(e)),
    }
}

#[allow(clippy::unused_async)]
async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    render_metrics(&state.metrics)
}
