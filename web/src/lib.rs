//! Axum plumbing shared by the evento backend and proxy.
//!
//! Handlers stay thin: they extract the request, call a service and map the
//! outcome to a response. This crate holds the pieces both services need for
//! that:
//!
//! - [`AppError`]: the `{code, message}` error body with its HTTP status
//! - [`correlation_id_layer`]: per-request span and `X-Correlation-ID` echo
//! - [`BearerToken`], [`CorrelationId`], [`JsonBody`], [`PathParam`]: extractors
//! - [`handlers::health_check`] and [`handlers::render_metrics`]
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use evento_web::{AppError, BearerToken, correlation_id_layer, handlers};
//!
//! async fn ventas(token: BearerToken) -> Result<Json<Vec<Venta>>, AppError> {
//!     // ...
//! }
//!
//! let app = Router::new()
//!     .route("/health", get(handlers::health_check))
//!     .route("/api/ventas", get(ventas))
//!     .layer(correlation_id_layer());
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorResponse};
pub use extractors::{BearerToken, CorrelationId, JsonBody, PathParam};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
