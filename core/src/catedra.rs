//! Cátedra wire format and gateway port.
//!
//! Cátedra is the authoritative ticketing system. The backend asks it to hold
//! seats, to register sales, and reads its event catalog from it. Field names
//! mirror its JSON API, including the `columnAsientos` spelling.

use crate::types::{Asiento, Money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seat status text cátedra reports for a successful hold.
pub const BLOQUEO_EXITOSO: &str = "Bloqueo exitoso";

// ============================================================================
// Seat holds
// ============================================================================

/// Body of `POST /api/endpoints/v1/bloquear-asientos`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloquearAsientosRequest {
    pub evento_id: i64,
    pub asientos: Vec<Asiento>,
}

/// Per-seat outcome of a hold request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsientoBloqueado {
    pub fila: u32,
    pub columna: u32,
    pub estado: String,
}

/// Answer to a hold request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloquearAsientosResponse {
    pub resultado: bool,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub evento_id: Option<i64>,
    #[serde(default)]
    pub asientos: Vec<AsientoBloqueado>,
}

impl BloquearAsientosResponse {
    /// True when cátedra accepted the hold for every seat it reported.
    #[must_use]
    pub fn exitoso(&self) -> bool {
        self.resultado
            && self
                .asientos
                .iter()
                .all(|a| a.estado.eq_ignore_ascii_case(BLOQUEO_EXITOSO))
    }

    /// Human readable reason for a rejected hold.
    #[must_use]
    pub fn motivo(&self) -> String {
        if let Some(descripcion) = self.descripcion.as_deref().filter(|d| !d.is_empty()) {
            return descripcion.to_string();
        }
        self.asientos
            .iter()
            .filter(|a| !a.estado.eq_ignore_ascii_case(BLOQUEO_EXITOSO))
            .map(|a| format!("{}-{}: {}", a.fila, a.columna, a.estado))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// Sales
// ============================================================================

/// Seat line of a sale request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsientoVenta {
    pub fila: u32,
    pub columna: u32,
    pub persona: String,
}

/// Body of `POST /api/endpoints/v1/realizar-venta`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizarVentaRequest {
    /// Event id in cátedra
    pub evento_id: i64,
    pub fecha: DateTime<Utc>,
    pub precio_venta: Money,
    pub asientos: Vec<AsientoVenta>,
}

/// Seat line of a sale answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsientoVentaRespuesta {
    pub fila: u32,
    pub columna: u32,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
}

/// Answer to a sale request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizarVentaResponse {
    #[serde(default)]
    pub evento_id: Option<i64>,
    #[serde(default)]
    pub venta_id: Option<i64>,
    #[serde(default)]
    pub fecha_venta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub asientos: Vec<AsientoVentaRespuesta>,
    pub resultado: bool,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub precio_venta: Option<Money>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Category as published by cátedra.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoTipoCatedra {
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// Performer as published by cátedra.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegranteCatedra {
    pub nombre: String,
    #[serde(default)]
    pub apellido: Option<String>,
    #[serde(default)]
    pub identificacion: Option<String>,
}

/// One entry of `GET /api/endpoints/v1/eventos`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventoCatedra {
    pub id: i64,
    pub titulo: String,
    #[serde(default)]
    pub resumen: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub fecha: Option<DateTime<Utc>>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub imagen: Option<String>,
    #[serde(default)]
    pub fila_asientos: Option<u32>,
    #[serde(default, rename = "columnAsientos")]
    pub columna_asientos: Option<u32>,
    #[serde(default)]
    pub precio_entrada: Option<Money>,
    #[serde(default)]
    pub evento_tipo: Option<EventoTipoCatedra>,
    #[serde(default)]
    pub integrantes: Vec<IntegranteCatedra>,
}

// ============================================================================
// Gateway port
// ============================================================================

/// Errors talking to an external HTTP service (cátedra or the proxy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport failure, timeout or 5xx
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected even after logging in again
    #[error("unauthorized")]
    Unauthorized,

    /// Unexpected non-success status
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated by the client)
        body: String,
    },

    /// Response body did not match the expected format
    #[error("invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// True when the remote answer is unknown: nothing was received, or what
    /// was received is not a business answer. Rejected credentials are a
    /// configuration problem, not a communication one.
    #[must_use]
    pub const fn is_communication(&self) -> bool {
        !matches!(self, Self::Unauthorized)
    }
}

/// Operations the backend needs from cátedra.
#[async_trait]
pub trait CatedraGateway: Send + Sync {
    /// Holds seats of a cátedra event for the calling backend.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when cátedra cannot be reached or answers
    /// with something other than a hold result.
    async fn bloquear_asientos(
        &self,
        evento_id_catedra: i64,
        asientos: &[Asiento],
    ) -> Result<BloquearAsientosResponse, GatewayError>;

    /// Registers a sale.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the sale outcome is unknown.
    async fn realizar_venta(
        &self,
        request: &RealizarVentaRequest,
    ) -> Result<RealizarVentaResponse, GatewayError>;

    /// Full event catalog.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the catalog cannot be fetched.
    async fn eventos(&self) -> Result<Vec<EventoCatedra>, GatewayError>;

    /// Liveness of cátedra.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when cátedra is not healthy.
    async fn health(&self) -> Result<(), GatewayError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hold_requires_every_seat_locked() {
        let json = r#"{
            "resultado": true,
            "descripcion": "",
            "eventoId": 7,
            "asientos": [
                {"fila": 1, "columna": 1, "estado": "Bloqueo exitoso"},
                {"fila": 1, "columna": 2, "estado": "BLOQUEO EXITOSO"}
            ]
        }"#;
        let response: BloquearAsientosResponse = serde_json::from_str(json).unwrap();
        assert!(response.exitoso());

        let partial = BloquearAsientosResponse {
            asientos: vec![AsientoBloqueado {
                fila: 2,
                columna: 2,
                estado: "Ocupado".to_string(),
            }],
            descripcion: None,
            ..response
        };
        assert!(!partial.exitoso());
        assert_eq!(partial.motivo(), "2-2: Ocupado");
    }

    #[test]
    fn rejected_credentials_are_not_a_communication_failure() {
        assert!(GatewayError::Unavailable("timeout".to_string()).is_communication());
        assert!(GatewayError::Decode("eof".to_string()).is_communication());
        assert!(!GatewayError::Unauthorized.is_communication());
    }

    #[test]
    fn catalog_entry_reads_column_spelling() {
        let json = r#"{
            "id": 3,
            "titulo": "Recital",
            "filaAsientos": 10,
            "columnAsientos": 20,
            "precioEntrada": 2500.00,
            "eventoTipo": {"nombre": "Concierto", "descripcion": "Música"},
            "integrantes": [{"nombre": "Ana", "apellido": "Paz", "identificacion": "AP"}]
        }"#;
        let evento: EventoCatedra = serde_json::from_str(json).unwrap();
        assert_eq!(evento.columna_asientos, Some(20));
        assert_eq!(evento.precio_entrada, Some(Money::from_cents(250_000)));
        assert_eq!(evento.integrantes.len(), 1);
    }
}
