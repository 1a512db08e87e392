//! Purchase session errors.

use crate::disponibilidad::DisponibilidadError;
use crate::repository::RepositoryError;
use crate::types::{Asiento, EstadoAsiento, EstadoSesion, EventoId};
use thiserror::Error;

/// Why a purchase session operation was refused or failed.
///
/// Every variant has a stable [`code`](CompraError::code) that clients use to
/// tell failures apart.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompraError {
    #[error("no active purchase session")]
    SesionNoEncontrada,

    #[error("event {0} not found")]
    EventoNoEncontrado(EventoId),

    #[error("event {0} is not active")]
    EventoInactivo(EventoId),

    #[error("event {0} has no seat configuration")]
    EventoSinConfigurar(EventoId),

    #[error("at least one seat must be selected")]
    SinAsientos,

    #[error("at most {max} seats can be bought at once")]
    DemasiadosAsientos { max: usize },

    #[error("seat selected twice: {0}")]
    AsientoDuplicado(Asiento),

    #[error("operation not allowed while the session is {actual}")]
    EstadoInvalido { actual: EstadoSesion },

    #[error("invalid row {fila}: must be between 1 and {max}")]
    FilaInvalida { fila: u32, max: u32 },

    #[error("invalid column {columna}: must be between 1 and {max}")]
    ColumnaInvalida { columna: u32, max: u32 },

    #[error("seat not available: {asiento} is {estado:?}")]
    AsientoNoDisponible { asiento: Asiento, estado: EstadoAsiento },

    #[error("seats could not be held: {0}")]
    BloqueoRechazado(String),

    #[error("expected {esperados} names, got {recibidos}")]
    CantidadNombres { esperados: usize, recibidos: usize },

    #[error("missing name for {0}")]
    NombreFaltante(Asiento),

    #[error("name for {asiento} must have at least {min} characters")]
    NombreInvalido { asiento: Asiento, min: usize },

    #[error("seat already sold: {0}")]
    AsientoVendido(String),

    #[error("expired holds could not be renewed: {0}")]
    ReBloqueoFallido(String),

    #[error("sale rejected: {0}")]
    VentaRechazada(String),

    #[error("ticketing authority unavailable, please retry in a few moments: {0}")]
    CatedraNoDisponible(String),

    #[error("seat availability unavailable: {0}")]
    ProxyNoDisponible(String),

    #[error("internal error: {0}")]
    Interno(String),
}

impl CompraError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SesionNoEncontrada => "nosession",
            Self::EventoNoEncontrado(_) => "eventonotfound",
            Self::EventoInactivo(_) => "eventoinactivo",
            Self::EventoSinConfigurar(_) => "eventosinconfigurar",
            Self::SinAsientos => "noasientos",
            Self::DemasiadosAsientos { .. } => "maxasientos",
            Self::AsientoDuplicado(_) => "asientoduplicado",
            Self::EstadoInvalido { .. } => "estadoinvalido",
            Self::FilaInvalida { .. } => "invalidrow",
            Self::ColumnaInvalida { .. } => "invalidcolumn",
            Self::AsientoNoDisponible { .. } => "asientonodisponible",
            Self::BloqueoRechazado(_) => "bloqueofallido",
            Self::CantidadNombres { .. } => "cantidadnombres",
            Self::NombreFaltante(_) => "nombrefaltante",
            Self::NombreInvalido { .. } => "nombreinvalido",
            Self::AsientoVendido(_) => "asientovendido",
            Self::ReBloqueoFallido(_) => "rebloqueofallido",
            Self::VentaRechazada(_) => "ventarechazada",
            Self::CatedraNoDisponible(_) => "catedradown",
            Self::ProxyNoDisponible(_) => "proxydown",
            Self::Interno(_) => "internal",
        }
    }
}

impl From<RepositoryError> for CompraError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(detalle) => Self::AsientoVendido(detalle),
            other => Self::Interno(other.to_string()),
        }
    }
}

impl From<DisponibilidadError> for CompraError {
    fn from(error: DisponibilidadError) -> Self {
        match error {
            DisponibilidadError::EventoInactivo(id) => Self::EventoInactivo(id),
            DisponibilidadError::EventoSinConfigurar(id) => Self::EventoSinConfigurar(id),
        }
    }
}
