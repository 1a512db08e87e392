//! HTTP handlers of the backend API.
//!
//! Handlers extract the caller and the request body, call one service and
//! map [`ServiceError`] onto the `{code, message}` error body.

pub mod auth;
pub mod compra;
pub mod eventos;
pub mod ventas;

use crate::services::ServiceError;
use axum::http::StatusCode;
use evento_core::compra::CompraError;
use evento_web::AppError;

/// HTTP status of a purchase error.
const fn status_compra(error: &CompraError) -> StatusCode {
    match error {
        CompraError::SesionNoEncontrada | CompraError::EventoNoEncontrado(_) => StatusCode::NOT_FOUND,
        CompraError::EventoInactivo(_)
        | CompraError::EventoSinConfigurar(_)
        | CompraError::SinAsientos
        | CompraError::DemasiadosAsientos { .. }
        | CompraError::AsientoDuplicado(_)
        | CompraError::FilaInvalida { .. }
        | CompraError::ColumnaInvalida { .. }
        | CompraError::CantidadNombres { .. }
        | CompraError::NombreFaltante(_)
        | CompraError::NombreInvalido { .. } => StatusCode::BAD_REQUEST,
        CompraError::EstadoInvalido { .. }
        | CompraError::AsientoNoDisponible { .. }
        | CompraError::BloqueoRechazado(_)
        | CompraError::AsientoVendido(_)
        | CompraError::ReBloqueoFallido(_)
        | CompraError::VentaRechazada(_) => StatusCode::CONFLICT,
        CompraError::CatedraNoDisponible(_) | CompraError::ProxyNoDisponible(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        },
        CompraError::Interno(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Compra(CompraError::Interno(detalle)) => {
                Self::internal_from(anyhow::anyhow!(detalle))
            },
            ServiceError::Compra(error) => {
                Self::new(status_compra(&error), error.code(), error.to_string())
            },
            ServiceError::CredencialesInvalidas => {
                Self::unauthorized("Invalid username or password").with_code("invalidcredentials")
            },
            ServiceError::TokenInvalido => Self::unauthorized("Invalid or expired token"),
            ServiceError::NotFound { resource, id } => Self::not_found(resource, id),
            ServiceError::CatedraNoDisponible(detalle) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "catedradown",
                format!("Ticketing authority unavailable: {detalle}"),
            ),
            error @ (ServiceError::Storage(_) | ServiceError::Runtime(_)) => {
                Self::internal_from(error)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evento_core::types::{Asiento, EstadoAsiento, EstadoSesion};

    #[test]
    fn purchase_errors_keep_their_code() {
        let error = AppError::from(ServiceError::Compra(CompraError::AsientoNoDisponible {
            asiento: Asiento::new(1, 1),
            estado: EstadoAsiento::Vendido,
        }));
        assert_eq!(error.status(), StatusCode::CONFLICT);
        assert_eq!(error.code(), "asientonodisponible");

        let error = AppError::from(ServiceError::Compra(CompraError::EstadoInvalido {
            actual: EstadoSesion::SeleccionAsientos,
        }));
        assert_eq!(error.code(), "estadoinvalido");
    }

    #[test]
    fn statuses_follow_error_kind() {
        let casos = [
            (CompraError::SesionNoEncontrada, StatusCode::NOT_FOUND),
            (CompraError::DemasiadosAsientos { max: 4 }, StatusCode::BAD_REQUEST),
            (CompraError::FilaInvalida { fila: 11, max: 10 }, StatusCode::BAD_REQUEST),
            (CompraError::VentaRechazada(String::new()), StatusCode::CONFLICT),
            (CompraError::CatedraNoDisponible(String::new()), StatusCode::SERVICE_UNAVAILABLE),
            (CompraError::ProxyNoDisponible(String::new()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in casos {
            assert_eq!(AppError::from(ServiceError::Compra(error)).status(), status);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let error = AppError::from(ServiceError::Compra(CompraError::Interno(
            "buyer not set".to_string(),
        )));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.message().contains("buyer"));

        let error = AppError::from(ServiceError::CredencialesInvalidas);
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.code(), "invalidcredentials");
    }
}
