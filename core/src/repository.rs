//! Persistence and cache ports.
//!
//! PostgreSQL implementations live in `evento-postgres`, the Redis session
//! cache in the backend, and in-memory versions in `evento-testing`.

use crate::catedra::EventoCatedra;
use crate::types::{
    AsientoSeleccionado, EstadoSesion, Evento, EventoId, NuevaSesion, NuevaVenta, Sesion,
    SesionId, Usuario, UsuarioId, Venta, VentaId,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Database or cache failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Uniqueness violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row that must exist does not
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Outcome of mirroring one cátedra event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Row inserted
    Creado(EventoId),
    /// Existing row updated
    Actualizado(EventoId),
}

/// Events.
#[async_trait]
pub trait EventoRepository: Send + Sync {
    /// Event by local id, with its category and performers.
    async fn find(&self, id: EventoId) -> Result<Option<Evento>>;

    /// Active events ordered by date.
    async fn list_activos(&self) -> Result<Vec<Evento>>;

    /// Inserts or updates the local mirror of a cátedra event, keyed by its
    /// cátedra id. The category is found or created by name, performers are
    /// replaced and the event is marked active.
    async fn upsert_desde_catedra(&self, evento: &EventoCatedra, now: DateTime<Utc>) -> Result<Upsert>;

    /// Deactivates active events whose cátedra id is not in `vigentes`.
    /// Returns how many were deactivated.
    async fn desactivar_ausentes(&self, vigentes: &[i64], now: DateTime<Utc>) -> Result<u64>;
}

/// Purchase sessions and their held seats.
#[async_trait]
pub trait SesionRepository: Send + Sync {
    /// Latest session of the user that is not [`EstadoSesion::Completado`].
    async fn find_abierta(&self, usuario: UsuarioId) -> Result<Option<Sesion>>;

    /// Stores a new session.
    async fn insert(&self, sesion: NuevaSesion) -> Result<Sesion>;

    /// Saves estado, activity timestamps and the active flag.
    async fn update(&self, sesion: &Sesion) -> Result<()>;

    /// Held seats of a session.
    async fn asientos(&self, sesion: SesionId) -> Result<Vec<AsientoSeleccionado>>;

    /// Replaces the held seats of a session (an empty slice clears them).
    async fn reemplazar_asientos(&self, sesion: SesionId, asientos: &[AsientoSeleccionado]) -> Result<()>;

    /// Open sessions idle since before `limite`.
    async fn expiradas(&self, limite: DateTime<Utc>) -> Result<Vec<Sesion>>;
}

/// Sales.
#[async_trait]
pub trait VentaRepository: Send + Sync {
    /// Stores a sale and its seats.
    ///
    /// A successful sale whose seat is already sold for the same event fails
    /// with [`RepositoryError::Conflict`].
    async fn insert(&self, venta: NuevaVenta) -> Result<Venta>;

    /// Sales of a user, newest first.
    async fn list_por_usuario(&self, usuario: UsuarioId) -> Result<Vec<Venta>>;

    /// A sale if it belongs to the user.
    async fn find_de_usuario(&self, usuario: UsuarioId, venta: VentaId) -> Result<Option<Venta>>;
}

/// Users.
#[async_trait]
pub trait UsuarioRepository: Send + Sync {
    /// User by login name.
    async fn find_by_login(&self, login: &str) -> Result<Option<Usuario>>;

    /// User by id.
    async fn find(&self, id: UsuarioId) -> Result<Option<Usuario>>;
}

/// Session cache entry, the hot copy of an open session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesionCacheEntry {
    pub sesion_id: SesionId,
    pub estado: EstadoSesion,
    pub ultima_actividad: DateTime<Utc>,
    pub expiracion: DateTime<Utc>,
    pub evento_id: EventoId,
    pub user_id: UsuarioId,
}

impl From<&Sesion> for SesionCacheEntry {
    fn from(sesion: &Sesion) -> Self {
        Self {
            sesion_id: sesion.id,
            estado: sesion.estado,
            ultima_actividad: sesion.ultima_actividad,
            expiracion: sesion.expiracion,
            evento_id: sesion.evento_id,
            user_id: sesion.usuario_id,
        }
    }
}

/// Expiring per-user cache of open sessions.
#[async_trait]
pub trait SesionCache: Send + Sync {
    /// Cached entry of the user, if not expired.
    async fn get(&self, usuario: UsuarioId) -> Result<Option<SesionCacheEntry>>;

    /// Writes the entry with a time to live.
    async fn put(&self, entry: &SesionCacheEntry, ttl: Duration) -> Result<()>;

    /// Drops the entry of the user.
    async fn remove(&self, usuario: UsuarioId) -> Result<()>;

    /// Seconds until the entry expires.
    async fn ttl_restante(&self, usuario: UsuarioId) -> Result<Option<i64>>;
}
