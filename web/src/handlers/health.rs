//! Liveness and metrics endpoints shared by both services.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use evento_runtime::metrics::MetricsHandle;

/// Liveness probe.
///
/// ```text
/// GET /health  ->  200 "ok"
/// ```
///
/// Does not check dependencies; each service has its own readiness check.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Prometheus text exposition of the installed recorder.
#[must_use]
pub fn render_metrics(handle: &MetricsHandle) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_is_plain_ok() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
