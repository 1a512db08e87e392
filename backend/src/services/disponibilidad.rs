//! Seat matrix of an event.

use super::ServiceError;
use evento_core::compra::CompraError;
use evento_core::disponibilidad::{MatrizAsientos, SeatFeed, validar_evento};
use evento_core::environment::Clock;
use evento_core::repository::EventoRepository;
use evento_core::types::EventoId;
use std::sync::Arc;

/// Builds seat matrices from the local event and the proxy snapshot.
pub struct DisponibilidadService {
    eventos: Arc<dyn EventoRepository>,
    feed: Arc<dyn SeatFeed>,
    clock: Arc<dyn Clock>,
}

impl DisponibilidadService {
    /// Creates the service.
    #[must_use]
    pub fn new(eventos: Arc<dyn EventoRepository>, feed: Arc<dyn SeatFeed>, clock: Arc<dyn Clock>) -> Self {
        Self { eventos, feed, clock }
    }

    /// Current seat matrix of an event.
    ///
    /// # Errors
    ///
    /// `eventonotfound`, `eventoinactivo`, `eventosinconfigurar`, or
    /// `proxydown` when the snapshot cannot be fetched.
    #[tracing::instrument(skip(self))]
    pub async fn matriz(&self, evento_id: EventoId) -> Result<MatrizAsientos, ServiceError> {
        let evento = self
            .eventos
            .find(evento_id)
            .await?
            .ok_or(CompraError::EventoNoEncontrado(evento_id))?;
        let config = validar_evento(&evento).map_err(CompraError::from)?;

        let snapshot = self.feed.snapshot(config.id_catedra).await.map_err(|e| {
            tracing::error!(evento_id = %evento_id, error = %e, "Seat snapshot unavailable");
            CompraError::ProxyNoDisponible(e.to_string())
        })?;

        Ok(MatrizAsientos::construir(
            &evento,
            config,
            snapshot.as_ref(),
            self.clock.now(),
        ))
    }
}
