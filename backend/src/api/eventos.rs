//! Event catalog endpoints:
//! - GET /api/eventos
//! - GET /api/eventos/:id
//! - GET /api/eventos/:id/asientos/disponibilidad
//! - POST /api/eventos/sincronizar-todo (admin)

use super::auth::{Admin, Autenticado};
use crate::server::state::AppState;
use crate::services::SyncResult;
use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use evento_core::disponibilidad::MatrizAsientos;
use evento_core::types::{Evento, EventoId};
use evento_web::{AppError, PathParam};

/// Active events.
pub async fn listar(
    _caller: Autenticado,
    State(state): State<AppState>,
) -> Result<Json<Vec<Evento>>, AppError> {
    Ok(Json(state.eventos.listar().await?))
}

/// One event, active or not.
pub async fn detalle(
    _caller: Autenticado,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Evento>, AppError> {
    Ok(Json(state.eventos.detalle(EventoId(id)).await?))
}

/// Seat matrix of an event, never cached by clients.
pub async fn disponibilidad(
    _caller: Autenticado,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let matriz: MatrizAsientos = state.disponibilidad.matriz(EventoId(id)).await?;
    Ok(([(header::CACHE_CONTROL, "no-cache")], Json(matriz)))
}

/// Pulls the whole catalog from cátedra.
///
/// Also called by the proxy when cátedra announces a change.
pub async fn sincronizar_todo(
    Admin(admin): Admin,
    State(state): State<AppState>,
) -> Result<Json<SyncResult>, AppError> {
    tracing::info!(usuario = %admin.id, "Catalog sync requested");
    Ok(Json(state.sync.sincronizar_todo().await?))
}
