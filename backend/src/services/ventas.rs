//! Sales history of the current user.

use super::ServiceError;
use evento_core::repository::VentaRepository;
use evento_core::types::{UsuarioId, Venta, VentaId};
use std::sync::Arc;

/// Read side of recorded sales.
pub struct VentaService {
    ventas: Arc<dyn VentaRepository>,
}

impl VentaService {
    /// Creates the service.
    #[must_use]
    pub fn new(ventas: Arc<dyn VentaRepository>) -> Self {
        Self { ventas }
    }

    /// Sales of the user, newest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn listar(&self, usuario: UsuarioId) -> Result<Vec<Venta>, ServiceError> {
        Ok(self.ventas.list_por_usuario(usuario).await?)
    }

    /// One sale of the user. Sales of other users are reported as missing.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], or a storage failure.
    pub async fn detalle(&self, usuario: UsuarioId, id: VentaId) -> Result<Venta, ServiceError> {
        self.ventas
            .find_de_usuario(usuario, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                resource: "Venta",
                id: id.to_string(),
            })
    }
}
