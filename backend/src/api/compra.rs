//! Purchase session endpoints under `/api/compra`.
//!
//! Every call acts on the caller's single open session.

use super::auth::Autenticado;
use crate::server::state::AppState;
use crate::services::{ActividadRespuesta, SesionEstado};
use axum::{Json, extract::State, http::StatusCode};
use evento_core::types::{Asiento, EventoId, Venta};
use evento_web::{AppError, JsonBody};
use serde::Deserialize;
use std::collections::HashMap;

/// Body of `POST /api/compra/iniciar`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IniciarRequest {
    /// Local event id
    pub evento_id: i64,
}

/// Body of `POST /api/compra/seleccionar-asientos`.
#[derive(Debug, Deserialize)]
pub struct SeleccionarRequest {
    /// Seats to hold, replacing the current selection
    pub asientos: Vec<Asiento>,
}

/// Body of `POST /api/compra/asignar-nombres`; names keyed by `"fila-columna"`.
#[derive(Debug, Deserialize)]
pub struct AsignarNombresRequest {
    /// Attendee per seat
    pub nombres: HashMap<String, String>,
}

/// Opens a session for an event, or resumes the open one.
///
/// ```bash
/// curl -X POST http://localhost:8081/api/compra/iniciar \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"eventoId": 1}'
/// ```
pub async fn iniciar(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<IniciarRequest>,
) -> Result<Json<SesionEstado>, AppError> {
    let estado = state
        .compra
        .iniciar(usuario.id, EventoId(request.evento_id))
        .await?;
    Ok(Json(estado))
}

/// The open session; 404 when there is none.
pub async fn estado(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
) -> Result<Json<SesionEstado>, AppError> {
    Ok(Json(state.compra.estado(usuario.id).await?))
}

/// Keeps the session alive.
pub async fn actividad(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
) -> Result<Json<ActividadRespuesta>, AppError> {
    Ok(Json(state.compra.actividad(usuario.id).await?))
}

/// Replaces the held seats.
pub async fn seleccionar_asientos(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SeleccionarRequest>,
) -> Result<Json<SesionEstado>, AppError> {
    let estado = state.compra.seleccionar(usuario.id, request.asientos).await?;
    Ok(Json(estado))
}

/// Names the attendee of each held seat.
pub async fn asignar_nombres(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AsignarNombresRequest>,
) -> Result<Json<SesionEstado>, AppError> {
    let estado = state
        .compra
        .asignar_nombres(usuario.id, request.nombres)
        .await?;
    Ok(Json(estado))
}

/// Registers the sale with cátedra and returns it.
pub async fn confirmar(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
) -> Result<Json<Venta>, AppError> {
    Ok(Json(state.compra.confirmar(usuario.id).await?))
}

/// Releases the session. 204 on success.
pub async fn cancelar(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.compra.cancelar(usuario.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
