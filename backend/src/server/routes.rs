//! Router configuration for the evento backend.

use super::health::{metrics_endpoint, readiness_check};
use super::state::AppState;
use crate::api::{auth, compra, eventos, ventas};
use axum::{
    Router,
    routing::{delete, get, post},
};
use evento_web::{correlation_id_layer, handlers::health_check};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

/// Build the complete Axum router.
///
/// Probes and metrics sit at the root; the API lives under `/api`. Every
/// API route except `/api/authenticate` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/authenticate", post(auth::authenticate))
        // Catalog
        .route("/eventos", get(eventos::listar))
        .route("/eventos/sincronizar-todo", post(eventos::sincronizar_todo))
        .route("/eventos/:id", get(eventos::detalle))
        .route(
            "/eventos/:id/asientos/disponibilidad",
            get(eventos::disponibilidad),
        )
        // Purchase session
        .route("/compra/iniciar", post(compra::iniciar))
        .route("/compra/estado", get(compra::estado))
        .route("/compra/actividad", post(compra::actividad))
        .route("/compra/seleccionar-asientos", post(compra::seleccionar_asientos))
        .route("/compra/asignar-nombres", post(compra::asignar_nombres))
        .route("/compra/confirmar", post(compra::confirmar))
        .route("/compra/cancelar", delete(compra::cancelar))
        // Sales
        .route("/ventas", get(ventas::listar))
        .route("/ventas/:id", get(ventas::detalle));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api", api_routes)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}
