//! The caller's sales.

use super::auth::Autenticado;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use evento_core::types::{Venta, VentaId};
use evento_web::{AppError, PathParam};

/// Sales of the caller, newest first.
pub async fn listar(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
) -> Result<Json<Vec<Venta>>, AppError> {
    Ok(Json(state.ventas.listar(usuario.id).await?))
}

/// One sale; 404 when it belongs to someone else.
pub async fn detalle(
    Autenticado(usuario): Autenticado,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Venta>, AppError> {
    Ok(Json(state.ventas.detalle(usuario.id, VentaId(id)).await?))
}
