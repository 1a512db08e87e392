//! Prometheus metrics shared by the evento binaries.
//!
//! Counters are recorded with the `metrics` macros wherever the event happens;
//! [`install`] registers their descriptions and the Prometheus recorder, and
//! the returned handle renders the scrape body served at `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn example() -> Result<(), evento_runtime::metrics::MetricsError> {
//! let handle = evento_runtime::metrics::install()?;
//! let body = handle.render();
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the Prometheus recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and describe the evento counters.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] when a recorder is already installed in
/// this process.
pub fn install() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    describe();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Handle of a recorder that is not installed globally.
///
/// Renders an empty scrape body; lets routers be built in tests without
/// claiming the process-wide recorder.
#[must_use]
pub fn detached() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn describe() {
    describe_counter!(
        "runtime.effects.executed",
        "Effects executed by the runtime, by effect type"
    );
    describe_counter!(
        "compra.ventas",
        "Sale attempts sent to cátedra, by resultado"
    );
    describe_counter!(
        "compra.sesiones.expiradas",
        "Purchase sessions closed by the expiration sweep"
    );
    describe_counter!(
        "sync.eventos",
        "Events processed by catalog synchronization, by resultado"
    );
    describe_counter!(
        "proxy.notificaciones",
        "Catalog change notifications forwarded to the backend, by resultado"
    );
}
