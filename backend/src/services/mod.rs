//! Application services.
//!
//! Each service owns the ports it needs and exposes the operations the HTTP
//! layer calls. Failures are [`ServiceError`]s; the API module maps them to
//! status codes.

pub mod auth;
pub mod compra;
pub mod disponibilidad;
pub mod eventos;
pub mod reaper;
pub mod sync;
pub mod ventas;

pub use auth::AuthService;
pub use compra::{ActividadRespuesta, CompraService, SesionEstado, UserLocks};
pub use disponibilidad::DisponibilidadService;
pub use eventos::EventoService;
pub use reaper::SesionReaper;
pub use sync::{SyncResult, SyncService};
pub use ventas::VentaService;

use evento_core::compra::CompraError;
use evento_core::repository::RepositoryError;
use evento_runtime::RuntimeError;
use thiserror::Error;

/// Errors returned by the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Purchase workflow refusal or failure
    #[error(transparent)]
    Compra(#[from] CompraError),

    /// Unknown login or wrong password
    #[error("invalid username or password")]
    CredencialesInvalidas,

    /// Missing, malformed or expired token
    #[error("invalid or expired token")]
    TokenInvalido,

    /// A resource owned by someone else or absent
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Resource kind
        resource: &'static str,
        /// Requested id
        id: String,
    },

    /// Cátedra could not be reached
    #[error("ticketing authority unavailable: {0}")]
    CatedraNoDisponible(String),

    /// Database or cache failure
    #[error(transparent)]
    Storage(#[from] RepositoryError),

    /// The purchase reducer did not settle
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
