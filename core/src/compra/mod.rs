//! Purchase session: the seat hold / finalize workflow.
//!
//! A buyer opens a session on an event, holds up to four seats through
//! cátedra, names the attendee of each seat and confirms the sale. The
//! [`CompraReducer`] enforces the state machine; every step that talks to
//! storage, the proxy or cátedra is an effect whose result comes back as a
//! [`CompraAction`].
//!
//! ```text
//! (none) ──Iniciar──► SELECCION_ASIENTOS ──SeleccionarAsientos──► CARGA_DATOS
//!                                                                   │  ▲
//!                                            SeleccionarAsientos /  │  │
//!                                            AsignarNombres         └──┘
//!
//! CARGA_DATOS ──Confirmar (accepted)──► COMPLETADO
//! any open ──Cancelar | expiry | Iniciar──► COMPLETADO
//! ```
//!
//! A rejected or undeliverable sale is recorded (`ERROR` / `PENDIENTE`) and
//! leaves the session in `CARGA_DATOS` so the buyer can retry.

mod error;
mod reducer;

pub use error::CompraError;
pub use reducer::CompraReducer;

use crate::catedra::{
    BloquearAsientosResponse, CatedraGateway, GatewayError, RealizarVentaRequest,
    RealizarVentaResponse,
};
use crate::disponibilidad::{SeatFeed, SnapshotAsientos};
use crate::environment::Clock;
use crate::repository::{
    EventoRepository, RepositoryError, SesionCache, SesionCacheEntry, SesionRepository,
    VentaRepository,
};
use crate::types::{
    Asiento, AsientoSeleccionado, Evento, EventoId, Sesion, UsuarioId, Venta,
};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Policy
// ============================================================================

/// Limits of the purchase workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoliticaCompra {
    /// Seats per purchase
    pub max_asientos: usize,
    /// Minimum trimmed length of an attendee name
    pub min_longitud_nombre: usize,
    /// Idle time after which a session expires
    pub ttl: Duration,
}

impl Default for PoliticaCompra {
    fn default() -> Self {
        Self {
            max_asientos: 4,
            min_longitud_nombre: 3,
            ttl: Duration::minutes(30),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Everything the reducer knows about one buyer's purchase.
#[derive(Clone, Debug, Default)]
pub struct CompraState {
    /// Buyer
    pub usuario: Option<UsuarioId>,
    /// Open session, if any
    pub sesion: Option<Sesion>,
    /// Event of the session
    pub evento: Option<Evento>,
    /// Seats currently held by the session
    pub asientos: Vec<AsientoSeleccionado>,
    /// Sale recorded by the last confirmation attempt
    pub venta: Option<Venta>,
    /// First error of the current command
    pub last_error: Option<CompraError>,
}

impl CompraState {
    /// State of a buyer with no open session.
    #[must_use]
    pub fn for_usuario(usuario: UsuarioId) -> Self {
        Self {
            usuario: Some(usuario),
            ..Self::default()
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs of the purchase reducer.
#[derive(Clone, Debug)]
pub enum CompraAction {
    // Commands
    /// Open a session on an event, closing any previous one
    Iniciar {
        /// Buyer
        usuario: UsuarioId,
        /// Event to buy for
        evento_id: EventoId,
    },
    /// Hold seats, replacing the current selection
    SeleccionarAsientos {
        /// Requested seats
        asientos: Vec<Asiento>,
    },
    /// Name the attendee of every held seat, keyed by `"fila-columna"`
    AsignarNombres {
        /// Names by seat key
        nombres: HashMap<String, String>,
    },
    /// Register the sale with cátedra
    Confirmar,
    /// Abandon the session
    Cancelar,
    /// Keep the session alive
    RegistrarActividad,

    // Effect results
    /// Event looked up for [`CompraAction::Iniciar`]
    EventoCargado {
        /// Requested event
        evento_id: EventoId,
        /// The event, if it exists
        evento: Option<Evento>,
    },
    /// New session stored
    SesionCreada {
        /// Stored session
        sesion: Sesion,
    },
    /// Snapshot fetched to validate a selection
    AsientosConsultados {
        /// Seats being selected
        asientos: Vec<Asiento>,
        /// Snapshot from the proxy
        snapshot: Option<SnapshotAsientos>,
    },
    /// Cátedra answered a hold request
    BloqueoRespondido {
        /// Seats being selected
        asientos: Vec<Asiento>,
        /// Cátedra's answer
        respuesta: BloquearAsientosResponse,
    },
    /// Snapshot fetched to re-check a confirmation
    DisponibilidadParaVenta {
        /// Snapshot from the proxy
        snapshot: Option<SnapshotAsientos>,
    },
    /// Cátedra answered the renewal of expired holds
    ReBloqueoRespondido {
        /// Sale to send once holds are renewed
        request: RealizarVentaRequest,
        /// Cátedra's answer
        respuesta: BloquearAsientosResponse,
    },
    /// Cátedra answered the sale
    VentaRespondida {
        /// Sale sent
        request: RealizarVentaRequest,
        /// Cátedra's answer
        respuesta: RealizarVentaResponse,
    },
    /// The sale could not be delivered to cátedra
    VentaNoEnviada {
        /// Sale that was attempted
        request: RealizarVentaRequest,
        /// Transport failure
        error: GatewayError,
    },
    /// Sale row stored
    VentaRegistrada {
        /// Stored sale
        venta: Venta,
    },
    /// An effect failed
    Fallo {
        /// What went wrong
        error: CompraError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Ports used by the purchase effects.
#[derive(Clone)]
pub struct CompraEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Seat holds and sales
    pub catedra: Arc<dyn CatedraGateway>,
    /// Seat snapshots from the proxy
    pub asientos: Arc<dyn SeatFeed>,
    /// Events
    pub eventos: Arc<dyn EventoRepository>,
    /// Sessions and held seats
    pub sesiones: Arc<dyn SesionRepository>,
    /// Sales
    pub ventas: Arc<dyn VentaRepository>,
    /// Hot session cache
    pub cache: Arc<dyn SesionCache>,
    /// Limits
    pub politica: PoliticaCompra,
}

// ============================================================================
// Shared persistence steps
// ============================================================================

/// Persists a closed session: estado, no held seats, no cache entry.
///
/// # Errors
///
/// Returns the first storage error.
pub async fn cerrar_sesion(
    sesiones: &dyn SesionRepository,
    cache: &dyn SesionCache,
    sesion: &Sesion,
) -> Result<(), RepositoryError> {
    sesiones.update(sesion).await?;
    sesiones.reemplazar_asientos(sesion.id, &[]).await?;
    cache.remove(sesion.usuario_id).await?;
    Ok(())
}

/// Persists an open session and refreshes its cache entry.
///
/// Held seats are replaced only when `asientos` is given.
///
/// # Errors
///
/// Returns the first storage error.
pub async fn guardar_sesion(
    sesiones: &dyn SesionRepository,
    cache: &dyn SesionCache,
    sesion: &Sesion,
    asientos: Option<&[AsientoSeleccionado]>,
    ttl: Duration,
) -> Result<(), RepositoryError> {
    if let Some(asientos) = asientos {
        sesiones.reemplazar_asientos(sesion.id, asientos).await?;
    }
    sesiones.update(sesion).await?;
    cache.put(&SesionCacheEntry::from(sesion), ttl).await?;
    Ok(())
}
