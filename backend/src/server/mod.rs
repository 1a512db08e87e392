//! HTTP server: shared state, routes and probes.

pub mod health;
pub mod routes;
pub mod state;

pub use health::{InfraProbe, ReadinessProbe, ReadinessResponse};
pub use routes::build_router;
pub use state::{AppState, Ports};
