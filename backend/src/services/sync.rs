//! Catalog synchronization with cátedra.
//!
//! Mirrors every cátedra event into the local catalog and deactivates local
//! events cátedra no longer publishes. Runs on demand: an admin call, or the
//! proxy forwarding a Kafka change notification.

use super::ServiceError;
use evento_core::catedra::CatedraGateway;
use evento_core::environment::Clock;
use evento_core::repository::{EventoRepository, Upsert};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of a full synchronization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Events inserted
    pub created: u64,
    /// Events updated
    pub updated: u64,
    /// Local events deactivated
    pub deactivated: u64,
    /// One line per event that could not be stored
    pub errors: Vec<String>,
}

/// Pulls the cátedra catalog into the local mirror.
pub struct SyncService {
    catedra: Arc<dyn CatedraGateway>,
    eventos: Arc<dyn EventoRepository>,
    clock: Arc<dyn Clock>,
    // One run at a time; notifications can arrive in bursts.
    en_curso: Mutex<()>,
}

impl SyncService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        catedra: Arc<dyn CatedraGateway>,
        eventos: Arc<dyn EventoRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catedra,
            eventos,
            clock,
            en_curso: Mutex::new(()),
        }
    }

    /// Synchronizes the whole catalog.
    ///
    /// A failure storing one event is recorded in
    /// [`SyncResult::errors`] and the run continues. An empty catalog
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// [`ServiceError::CatedraNoDisponible`] when the catalog cannot be
    /// fetched; a storage failure while deactivating.
    #[tracing::instrument(skip(self))]
    pub async fn sincronizar_todo(&self) -> Result<SyncResult, ServiceError> {
        let _guard = self.en_curso.lock().await;

        let catalogo = self.catedra.eventos().await.map_err(|e| {
            tracing::error!(error = %e, "Cátedra catalog unavailable");
            ServiceError::CatedraNoDisponible(e.to_string())
        })?;
        if catalogo.is_empty() {
            // An empty answer is indistinguishable from a cátedra hiccup.
            tracing::warn!("Cátedra returned an empty catalog; local events left untouched");
            return Ok(SyncResult::default());
        }
        let now = self.clock.now();
        let mut resultado = SyncResult::default();

        for evento in &catalogo {
            match self.eventos.upsert_desde_catedra(evento, now).await {
                Ok(Upsert::Creado(id)) => {
                    resultado.created += 1;
                    metrics::counter!("sync.eventos", "resultado" => "creado").increment(1);
                    tracing::debug!(evento_id = %id, id_catedra = evento.id, "Event created");
                },
                Ok(Upsert::Actualizado(id)) => {
                    resultado.updated += 1;
                    metrics::counter!("sync.eventos", "resultado" => "actualizado").increment(1);
                    tracing::debug!(evento_id = %id, id_catedra = evento.id, "Event updated");
                },
                Err(e) => {
                    metrics::counter!("sync.eventos", "resultado" => "error").increment(1);
                    tracing::warn!(id_catedra = evento.id, error = %e, "Event not synchronized");
                    resultado.errors.push(format!("evento {}: {e}", evento.id));
                },
            }
        }

        let vigentes: Vec<i64> = catalogo.iter().map(|e| e.id).collect();
        resultado.deactivated = self.eventos.desactivar_ausentes(&vigentes, now).await?;
        if resultado.deactivated > 0 {
            metrics::counter!("sync.eventos", "resultado" => "desactivado")
                .increment(resultado.deactivated);
        }

        tracing::info!(
            created = resultado.created,
            updated = resultado.updated,
            deactivated = resultado.deactivated,
            errors = resultado.errors.len(),
            "Catalog synchronized"
        );
        Ok(resultado)
    }
}
