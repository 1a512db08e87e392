//! Background expiration of idle purchase sessions.

use super::compra::UserLocks;
use chrono::Duration;
use evento_core::compra::cerrar_sesion;
use evento_core::environment::Clock;
use evento_core::repository::{RepositoryError, SesionCache, SesionRepository};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Closes sessions idle for longer than the TTL.
pub struct SesionReaper {
    sesiones: Arc<dyn SesionRepository>,
    cache: Arc<dyn SesionCache>,
    clock: Arc<dyn Clock>,
    locks: Arc<UserLocks>,
    ttl: Duration,
}

impl SesionReaper {
    /// Creates the sweep.
    #[must_use]
    pub fn new(
        sesiones: Arc<dyn SesionRepository>,
        cache: Arc<dyn SesionCache>,
        clock: Arc<dyn Clock>,
        locks: Arc<UserLocks>,
        ttl: Duration,
    ) -> Self {
        Self {
            sesiones,
            cache,
            clock,
            locks,
            ttl,
        }
    }

    /// One sweep. Returns how many sessions were closed.
    ///
    /// # Errors
    ///
    /// Returns the storage error when expired sessions cannot be listed. A
    /// session that fails to close is logged and left for the next sweep.
    pub async fn barrer(&self) -> Result<usize, RepositoryError> {
        let limite = self.clock.now() - self.ttl;
        let candidatas = self.sesiones.expiradas(limite).await?;
        let mut cerradas = 0;

        for candidata in candidatas {
            let _guard = self.locks.lock(candidata.usuario_id).await;
            // The buyer may have touched it while this sweep waited.
            let Some(mut sesion) = self
                .sesiones
                .find_abierta(candidata.usuario_id)
                .await?
                .filter(|s| s.id == candidata.id && s.ultima_actividad < limite)
            else {
                continue;
            };

            sesion.cerrar();
            match cerrar_sesion(self.sesiones.as_ref(), self.cache.as_ref(), &sesion).await {
                Ok(()) => {
                    cerradas += 1;
                    tracing::debug!(sesion_id = %sesion.id, usuario = %sesion.usuario_id, "Expired session closed");
                },
                Err(e) => {
                    tracing::warn!(sesion_id = %sesion.id, error = %e, "Expired session not closed");
                },
            }
        }

        if cerradas > 0 {
            metrics::counter!("compra.sesiones.expiradas").increment(u64::try_from(cerradas).unwrap_or(u64::MAX));
            tracing::info!(cerradas, "Expired purchase sessions closed");
        }
        Ok(cerradas)
    }

    /// Runs [`barrer`](Self::barrer) every `intervalo` until the task is
    /// aborted.
    #[must_use]
    pub fn spawn(self: Arc<Self>, intervalo: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervalo);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.barrer().await {
                    tracing::error!(error = %e, "Session expiration sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use evento_core::repository::SesionCacheEntry;
    use evento_core::types::{
        Asiento, AsientoSeleccionado, EstadoSesion, EventoId, NuevaSesion, Sesion, UsuarioId,
    };
    use evento_testing::{ManualClock, Puertos, test_time};

    async fn abrir(puertos: &Puertos, usuario: i64) -> Sesion {
        let now = puertos.clock.now();
        let sesion = puertos
            .sesiones
            .insert(NuevaSesion {
                usuario_id: UsuarioId(usuario),
                evento_id: EventoId(1),
                estado: EstadoSesion::CargaDatos,
                fecha_inicio: now,
                ultima_actividad: now,
                expiracion: now + Duration::minutes(30),
            })
            .await
            .unwrap();
        puertos
            .sesiones
            .reemplazar_asientos(sesion.id, &[AsientoSeleccionado::sin_nombre(Asiento::new(1, 1))])
            .await
            .unwrap();
        puertos
            .cache
            .put(&SesionCacheEntry::from(&sesion), Duration::minutes(30))
            .await
            .unwrap();
        sesion
    }

    #[tokio::test]
    async fn closes_only_idle_sessions() {
        let clock = ManualClock::new(test_time());
        let puertos = Puertos::new(clock.clone());
        let vieja = abrir(&puertos, 1).await;
        clock.advance(Duration::minutes(20));
        let reciente = abrir(&puertos, 2).await;
        clock.advance(Duration::minutes(15));

        let reaper = SesionReaper::new(
            puertos.sesiones.clone(),
            puertos.cache.clone(),
            Arc::clone(&puertos.clock),
            Arc::new(UserLocks::new()),
            Duration::minutes(30),
        );
        assert_eq!(reaper.barrer().await.unwrap(), 1);

        let sesiones = puertos.sesiones.todas();
        let cerrada = sesiones.iter().find(|s| s.id == vieja.id).unwrap();
        assert_eq!(cerrada.estado, EstadoSesion::Completado);
        assert!(puertos.sesiones.asientos_de(vieja.id).is_empty());
        assert_eq!(puertos.cache.entrada(UsuarioId(1)), None);

        let viva = sesiones.iter().find(|s| s.id == reciente.id).unwrap();
        assert!(viva.abierta());

        // Nothing left to close.
        assert_eq!(reaper.barrer().await.unwrap(), 0);
    }
}
