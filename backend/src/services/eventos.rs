//! Event catalog reads.

use super::ServiceError;
use evento_core::compra::CompraError;
use evento_core::repository::EventoRepository;
use evento_core::types::{Evento, EventoId};
use std::sync::Arc;

/// Read side of the local event mirror.
pub struct EventoService {
    eventos: Arc<dyn EventoRepository>,
}

impl EventoService {
    /// Creates the service.
    #[must_use]
    pub fn new(eventos: Arc<dyn EventoRepository>) -> Self {
        Self { eventos }
    }

    /// Active events, by date.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn listar(&self) -> Result<Vec<Evento>, ServiceError> {
        Ok(self.eventos.list_activos().await?)
    }

    /// One event with its category and performers.
    ///
    /// # Errors
    ///
    /// `eventonotfound`, or a storage failure.
    pub async fn detalle(&self, id: EventoId) -> Result<Evento, ServiceError> {
        self.eventos
            .find(id)
            .await?
            .ok_or_else(|| CompraError::EventoNoEncontrado(id).into())
    }
}
