//! End-to-end tests of the backend router over in-memory ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use chrono::Duration;
use evento_backend::server::{ReadinessProbe, ReadinessResponse};
use evento_backend::services::UserLocks;
use evento_backend::{AppState, Ports, build_router};
use evento_core::compra::PoliticaCompra;
use evento_testing::fixtures::{evento, evento_catedra, usuario};
use evento_testing::{ManualClock, Puertos, test_time};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct FixedProbe(ReadinessResponse);

#[async_trait]
impl ReadinessProbe for FixedProbe {
    async fn check(&self) -> ReadinessResponse {
        self.0.clone()
    }
}

struct TestApp {
    router: Router,
    puertos: Puertos,
}

fn app_with_probe(probe: ReadinessResponse) -> TestApp {
    let puertos = Puertos::new(ManualClock::new(test_time()));
    puertos.eventos.insert(evento(1));
    puertos.usuarios.insert(usuario(1, "admin", true));
    puertos.usuarios.insert(usuario(2, "user", false));

    let ports = Ports {
        clock: Arc::clone(&puertos.clock),
        catedra: puertos.catedra.clone(),
        feed: puertos.feed.clone(),
        eventos: puertos.eventos.clone(),
        sesiones: puertos.sesiones.clone(),
        ventas: puertos.ventas.clone(),
        usuarios: puertos.usuarios.clone(),
        cache: puertos.cache.clone(),
        politica: PoliticaCompra::default(),
        token_ttl: Duration::hours(24),
    };
    let state = AppState::new(
        &ports,
        Arc::new(UserLocks::new()),
        Arc::new(FixedProbe(probe)),
        evento_runtime::metrics::detached(),
    );
    TestApp {
        router: build_router(state),
        puertos,
    }
}

fn app() -> TestApp {
    app_with_probe(ReadinessResponse::from_checks(true, true, true))
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self, username: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/api/authenticate",
                None,
                Some(json!({ "username": username, "password": "user" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["id_token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Probes
// ============================================================================

#[tokio::test]
async fn health_and_metrics_need_no_token() {
    let app = app();

    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_reports_each_dependency() {
    let response = app().send(Method::GET, "/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["catedra"], json!(true));

    let caido = app_with_probe(ReadinessResponse::from_checks(true, false, true));
    let response = caido.send(Method::GET, "/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["ready"], json!(false));
    assert_eq!(body["redis"], json!(false));
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let response = app()
        .send(
            Method::POST,
            "/api/authenticate",
            None,
            Some(json!({ "username": "user", "password": "nope" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], json!("invalidcredentials"));
}

#[tokio::test]
async fn api_requires_a_valid_token() {
    let app = app();

    let response = app.send(Method::GET, "/api/eventos", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(Method::GET, "/api/eventos", Some("basura"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_sync_is_admin_only() {
    let app = app();
    app.puertos
        .catedra
        .con_catalogo(Ok(vec![evento_catedra(501, "Evento 1"), evento_catedra(777, "Nuevo")]));

    let user = app.login("user").await;
    let response = app
        .send(Method::POST, "/api/eventos/sincronizar-todo", Some(&user), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.login("admin").await;
    let response = app
        .send(Method::POST, "/api/eventos/sincronizar-todo", Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["created"], json!(1));
    assert_eq!(body["updated"], json!(1));
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn events_and_availability() {
    let app = app();
    let token = app.login("user").await;

    let response = app.send(Method::GET, "/api/eventos", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().map(Vec::len), Some(1));

    let response = app.send(Method::GET, "/api/eventos/99", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], json!("eventonotfound"));

    let response = app
        .send(Method::GET, "/api/eventos/1/asientos/disponibilidad", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
}

#[tokio::test]
async fn malformed_path_is_a_bad_request() {
    let app = app();
    let token = app.login("user").await;

    let response = app.send(Method::GET, "/api/eventos/uno", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Purchase
// ============================================================================

#[tokio::test]
async fn purchase_flow_ends_in_a_sale() {
    let app = app();
    let token = app.login("user").await;

    let response = app
        .send(Method::POST, "/api/compra/iniciar", Some(&token), Some(json!({ "eventoId": 1 })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let sesion = json_body(response).await;
    assert_eq!(sesion["estado"], json!("SELECCION_ASIENTOS"));
    assert_eq!(sesion["tiempoRestanteSegundos"], json!(1800));

    let response = app
        .send(
            Method::POST,
            "/api/compra/seleccionar-asientos",
            Some(&token),
            Some(json!({ "asientos": [{ "fila": 1, "columna": 1 }, { "fila": 1, "columna": 2 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["cantidadAsientos"], json!(2));

    let response = app
        .send(
            Method::POST,
            "/api/compra/asignar-nombres",
            Some(&token),
            Some(json!({ "nombres": { "1-1": "Ana Paz", "1-2": "Luis Gil" } })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(Method::POST, "/api/compra/confirmar", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let venta = json_body(response).await;
    assert_eq!(venta["exitosa"], json!(true));

    let response = app.send(Method::GET, "/api/ventas", Some(&token), None).await;
    assert_eq!(json_body(response).await.as_array().map(Vec::len), Some(1));

    let id = venta["id"].as_i64().unwrap();
    let response = app
        .send(Method::GET, &format!("/api/ventas/{id}"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let otro = app.login("admin").await;
    let response = app
        .send(Method::GET, &format!("/api/ventas/{id}"), Some(&otro), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_endpoints_without_session() {
    let app = app();
    let token = app.login("user").await;

    let response = app.send(Method::GET, "/api/compra/estado", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], json!("nosession"));

    let response = app.send(Method::POST, "/api/compra/actividad", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_releases_the_session() {
    let app = app();
    let token = app.login("user").await;
    app.send(Method::POST, "/api/compra/iniciar", Some(&token), Some(json!({ "eventoId": 1 })))
        .await;

    let response = app.send(Method::DELETE, "/api/compra/cancelar", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(Method::GET, "/api/compra/estado", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn too_many_seats_is_a_bad_request() {
    let app = app();
    let token = app.login("user").await;
    app.send(Method::POST, "/api/compra/iniciar", Some(&token), Some(json!({ "eventoId": 1 })))
        .await;

    let asientos: Vec<Value> = (1..=5).map(|c| json!({ "fila": 1, "columna": c })).collect();
    let response = app
        .send(
            Method::POST,
            "/api/compra/seleccionar-asientos",
            Some(&token),
            Some(json!({ "asientos": asientos })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
