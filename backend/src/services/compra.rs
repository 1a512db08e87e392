//! Purchase session service.
//!
//! Every request rebuilds the buyer's [`CompraState`] from Postgres and the
//! session cache, runs one command through the reducer and reports the
//! outcome. Operations of the same buyer are serialized with a per-user lock.

use super::ServiceError;
use chrono::{DateTime, Duration, Utc};
use evento_core::compra::{
    CompraAction, CompraEnvironment, CompraError, CompraReducer, CompraState, cerrar_sesion,
};
use evento_core::repository::SesionCacheEntry;
use evento_core::types::{
    Asiento, AsientoSeleccionado, EstadoSesion, EventoId, SesionId, UsuarioId, Venta,
};
use evento_runtime::EffectRunner;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Lock entries kept before idle ones are pruned.
const MAX_IDLE_LOCKS: usize = 1024;

// ============================================================================
// Per-user locks
// ============================================================================

/// Keyed async locks, one per buyer.
///
/// Shared by the purchase service and the expiration sweep so a session is
/// never closed while a request of its buyer is in flight.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UsuarioId, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    /// Empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the buyer's purchase.
    pub async fn lock(&self, usuario: UsuarioId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > MAX_IDLE_LOCKS {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(usuario).or_default())
        };
        lock.lock_owned().await
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Snapshot of an open purchase session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SesionEstado {
    pub sesion_id: SesionId,
    pub evento_id: EventoId,
    pub titulo_evento: Option<String>,
    pub estado: EstadoSesion,
    pub asientos_seleccionados: Vec<AsientoSeleccionado>,
    /// Names by `"fila-columna"`
    pub nombres_asignados: BTreeMap<String, String>,
    pub cantidad_asientos: usize,
    pub tiempo_restante_segundos: i64,
    pub ultima_actividad: DateTime<Utc>,
    pub expiracion: DateTime<Utc>,
}

/// Answer to an activity ping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActividadRespuesta {
    pub tiempo_restante_segundos: i64,
    pub nueva_expiracion: DateTime<Utc>,
    pub sesion_activa: bool,
}

// ============================================================================
// Service
// ============================================================================

/// Drives the purchase workflow for HTTP requests.
pub struct CompraService {
    runner: EffectRunner<CompraReducer>,
    locks: Arc<UserLocks>,
}

impl CompraService {
    /// Creates the service over the purchase ports.
    #[must_use]
    pub fn new(environment: CompraEnvironment, locks: Arc<UserLocks>) -> Self {
        Self {
            runner: EffectRunner::new(CompraReducer::new(), environment),
            locks,
        }
    }

    fn env(&self) -> &CompraEnvironment {
        self.runner.environment()
    }

    /// Rebuilds the buyer's state.
    ///
    /// The session cache decides whether the open session in Postgres is
    /// still alive. Without a matching entry the session is checked against
    /// the idle timeout: expired sessions are closed, live ones re-cached.
    async fn cargar(&self, usuario: UsuarioId) -> Result<CompraState, ServiceError> {
        let env = self.env();
        let now = env.clock.now();
        let mut state = CompraState::for_usuario(usuario);

        let cacheada = env.cache.get(usuario).await.unwrap_or_else(|e| {
            tracing::warn!(usuario = %usuario, error = %e, "Session cache unavailable, reading Postgres");
            None
        });

        let Some(mut sesion) = env.sesiones.find_abierta(usuario).await? else {
            if cacheada.is_some() {
                if let Err(e) = env.cache.remove(usuario).await {
                    tracing::warn!(usuario = %usuario, error = %e, "Stale session cache entry not removed");
                }
            }
            return Ok(state);
        };

        if cacheada.as_ref().is_none_or(|c| c.sesion_id != sesion.id) {
            if sesion.expirada(now, env.politica.ttl) {
                tracing::info!(usuario = %usuario, sesion_id = %sesion.id, "Purchase session expired");
                sesion.cerrar();
                cerrar_sesion(env.sesiones.as_ref(), env.cache.as_ref(), &sesion).await?;
                metrics::counter!("compra.sesiones.expiradas").increment(1);
                return Ok(state);
            }
            let restante = (sesion.expiracion - now).max(Duration::seconds(1));
            if let Err(e) = env.cache.put(&SesionCacheEntry::from(&sesion), restante).await {
                tracing::warn!(usuario = %usuario, error = %e, "Session cache not rehydrated");
            }
        }

        state.evento = env.eventos.find(sesion.evento_id).await?;
        state.asientos = env.sesiones.asientos(sesion.id).await?;
        state.sesion = Some(sesion);
        Ok(state)
    }

    async fn ejecutar(&self, state: &mut CompraState, action: CompraAction) -> Result<(), ServiceError> {
        self.runner.send(state, action).await?;
        match state.last_error.take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    async fn describir(&self, state: &CompraState) -> Result<SesionEstado, ServiceError> {
        let sesion = state
            .sesion
            .as_ref()
            .filter(|s| s.abierta())
            .ok_or(CompraError::SesionNoEncontrada)?;
        let tiempo_restante_segundos = self.tiempo_restante(sesion.usuario_id, sesion.expiracion).await;

        Ok(SesionEstado {
            sesion_id: sesion.id,
            evento_id: sesion.evento_id,
            titulo_evento: state.evento.as_ref().map(|e| e.titulo.clone()),
            estado: sesion.estado,
            nombres_asignados: state
                .asientos
                .iter()
                .filter_map(|a| Some((a.asiento.clave(), a.nombre_persona.clone()?)))
                .collect(),
            cantidad_asientos: state.asientos.len(),
            asientos_seleccionados: state.asientos.clone(),
            tiempo_restante_segundos,
            ultima_actividad: sesion.ultima_actividad,
            expiracion: sesion.expiracion,
        })
    }

    /// Cache TTL, or the stored expiration when the cache cannot tell.
    async fn tiempo_restante(&self, usuario: UsuarioId, expiracion: DateTime<Utc>) -> i64 {
        match self.env().cache.ttl_restante(usuario).await {
            Ok(Some(segundos)) => segundos,
            Ok(None) => (expiracion - self.env().clock.now()).num_seconds().max(0),
            Err(e) => {
                tracing::debug!(usuario = %usuario, error = %e, "Session TTL read failed");
                (expiracion - self.env().clock.now()).num_seconds().max(0)
            },
        }
    }

    /// Opens a session on an event, closing the buyer's previous one once the
    /// event is found active.
    ///
    /// # Errors
    ///
    /// `eventonotfound`, `eventoinactivo`, or a storage failure.
    #[tracing::instrument(skip(self), fields(usuario = %usuario))]
    pub async fn iniciar(&self, usuario: UsuarioId, evento_id: EventoId) -> Result<SesionEstado, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        self.ejecutar(&mut state, CompraAction::Iniciar { usuario, evento_id })
            .await?;
        self.describir(&state).await
    }

    /// Current open session.
    ///
    /// # Errors
    ///
    /// `nosession` when the buyer has none.
    #[tracing::instrument(skip(self), fields(usuario = %usuario))]
    pub async fn estado(&self, usuario: UsuarioId) -> Result<SesionEstado, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let state = self.cargar(usuario).await?;
        self.describir(&state).await
    }

    /// Keeps the session alive.
    ///
    /// # Errors
    ///
    /// `nosession` when the buyer has none.
    #[tracing::instrument(skip(self), fields(usuario = %usuario))]
    pub async fn actividad(&self, usuario: UsuarioId) -> Result<ActividadRespuesta, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        self.ejecutar(&mut state, CompraAction::RegistrarActividad)
            .await?;

        let sesion = state.sesion.as_ref().ok_or(CompraError::SesionNoEncontrada)?;
        Ok(ActividadRespuesta {
            tiempo_restante_segundos: self.tiempo_restante(usuario, sesion.expiracion).await,
            nueva_expiracion: sesion.expiracion,
            sesion_activa: sesion.abierta(),
        })
    }

    /// Holds seats through cátedra, replacing the current selection.
    ///
    /// # Errors
    ///
    /// Any selection refusal (`noasientos`, `asientonodisponible`, ...),
    /// `catedradown` or `proxydown`.
    #[tracing::instrument(skip(self, asientos), fields(usuario = %usuario, cantidad = asientos.len()))]
    pub async fn seleccionar(
        &self,
        usuario: UsuarioId,
        asientos: Vec<Asiento>,
    ) -> Result<SesionEstado, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        self.ejecutar(&mut state, CompraAction::SeleccionarAsientos { asientos })
            .await?;
        self.describir(&state).await
    }

    /// Names the attendee of every held seat.
    ///
    /// # Errors
    ///
    /// `cantidadnombres`, `nombrefaltante`, `nombreinvalido`, or a state
    /// refusal.
    #[tracing::instrument(skip(self, nombres), fields(usuario = %usuario))]
    pub async fn asignar_nombres(
        &self,
        usuario: UsuarioId,
        nombres: HashMap<String, String>,
    ) -> Result<SesionEstado, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        self.ejecutar(&mut state, CompraAction::AsignarNombres { nombres })
            .await?;
        self.describir(&state).await
    }

    /// Registers the sale with cátedra.
    ///
    /// # Errors
    ///
    /// `ventarechazada` and `catedradown` after the attempt is recorded, or
    /// any precondition refusal.
    #[tracing::instrument(skip(self), fields(usuario = %usuario))]
    pub async fn confirmar(&self, usuario: UsuarioId) -> Result<Venta, ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        let resultado = self.ejecutar(&mut state, CompraAction::Confirmar).await;

        let etiqueta = match &resultado {
            Ok(()) => Some("exitosa"),
            Err(ServiceError::Compra(CompraError::VentaRechazada(_))) => Some("rechazada"),
            Err(ServiceError::Compra(CompraError::CatedraNoDisponible(_))) if state.venta.is_some() => {
                Some("pendiente")
            },
            Err(_) => None,
        };
        if let Some(etiqueta) = etiqueta {
            metrics::counter!("compra.ventas", "resultado" => etiqueta).increment(1);
        }
        resultado?;

        state
            .venta
            .take()
            .ok_or_else(|| CompraError::Interno("sale not recorded".to_string()).into())
    }

    /// Abandons the session.
    ///
    /// # Errors
    ///
    /// `nosession` when the buyer has none.
    #[tracing::instrument(skip(self), fields(usuario = %usuario))]
    pub async fn cancelar(&self, usuario: UsuarioId) -> Result<(), ServiceError> {
        let _guard = self.locks.lock(usuario).await;
        let mut state = self.cargar(usuario).await?;
        self.ejecutar(&mut state, CompraAction::Cancelar).await
    }
}
