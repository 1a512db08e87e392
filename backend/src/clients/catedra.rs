//! Cátedra REST client.
//!
//! Every endpoint but the health check needs a bearer token obtained from
//! `/api/authenticate` with the service account. The token is kept in memory
//! until cátedra rejects it; a 401 triggers one new login and one retry.

use super::{decode, unavailable};
use async_trait::async_trait;
use evento_core::catedra::{
    BloquearAsientosRequest, BloquearAsientosResponse, CatedraGateway, EventoCatedra,
    GatewayError, RealizarVentaRequest, RealizarVentaResponse,
};
use evento_core::types::Asiento;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: &'static str,
}

#[derive(Deserialize)]
struct JwtToken {
    id_token: String,
}

/// Client of the cátedra API.
pub struct CatedraClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl CatedraClient {
    /// Creates a client for `base_url` authenticating as `username`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable(&e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn login(&self) -> Result<String, GatewayError> {
        tracing::debug!(username = %self.username, "Logging in to cátedra");
        let response = self
            .http
            .post(self.url("/api/authenticate"))
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
                remember_me: "false",
            })
            .send()
            .await
            .map_err(|e| unavailable(&e))?;
        let jwt: JwtToken = decode(response).await?;
        Ok(jwt.id_token)
    }

    async fn token(&self) -> Result<String, GatewayError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        let mut slot = self.token.write().await;
        // Another request may have logged in while this one waited.
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    async fn invalidar(&self, rechazado: &str) {
        let mut slot = self.token.write().await;
        if slot.as_deref() == Some(rechazado) {
            *slot = None;
        }
    }

    /// Sends an authenticated request, logging in again once on a 401.
    async fn call<T, F>(&self, build: F) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&token).send().await.map_err(|e| unavailable(&e))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        tracing::info!("Cátedra rejected the token, logging in again");
        self.invalidar(&token).await;
        let token = self.token().await?;
        let response = build(&token).send().await.map_err(|e| unavailable(&e))?;
        decode(response).await
    }
}

#[async_trait]
impl CatedraGateway for CatedraClient {
    #[tracing::instrument(skip(self, asientos), fields(cantidad = asientos.len()))]
    async fn bloquear_asientos(
        &self,
        evento_id_catedra: i64,
        asientos: &[Asiento],
    ) -> Result<BloquearAsientosResponse, GatewayError> {
        let body = BloquearAsientosRequest {
            evento_id: evento_id_catedra,
            asientos: asientos.to_vec(),
        };
        let url = self.url("/api/endpoints/v1/bloquear-asientos");
        self.call(|token| self.http.post(&url).bearer_auth(token).json(&body))
            .await
    }

    #[tracing::instrument(skip_all, fields(evento_id_catedra = request.evento_id))]
    async fn realizar_venta(
        &self,
        request: &RealizarVentaRequest,
    ) -> Result<RealizarVentaResponse, GatewayError> {
        let url = self.url("/api/endpoints/v1/realizar-venta");
        self.call(|token| self.http.post(&url).bearer_auth(token).json(request))
            .await
    }

    async fn eventos(&self) -> Result<Vec<EventoCatedra>, GatewayError> {
        let url = self.url("/api/endpoints/v1/eventos");
        self.call(|token| self.http.get(&url).bearer_auth(token)).await
    }

    async fn health(&self) -> Result<(), GatewayError> {
        let response = self
            .http
            .get(self.url("/management/health"))
            .send()
            .await
            .map_err(|e| unavailable(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(format!(
                "health check answered {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CatedraClient {
        CatedraClient::new(server.uri(), "alumno", "secreto", Duration::from_secs(2)).unwrap()
    }

    async fn login_devuelve(server: &MockServer, token: &str, veces: u64) {
        Mock::given(method("POST"))
            .and(path("/api/authenticate"))
            .and(body_json(json!({
                "username": "alumno",
                "password": "secreto",
                "rememberMe": "false"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id_token": token })))
            .up_to_n_times(veces)
            .expect(veces)
            .mount(server)
            .await;
    }

    fn bloqueo_ok() -> serde_json::Value {
        json!({
            "resultado": true,
            "descripcion": "",
            "eventoId": 7,
            "asientos": [{ "fila": 1, "columna": 2, "estado": "Bloqueo exitoso" }]
        })
    }

    #[tokio::test]
    async fn holds_seats_with_bearer_token() {
        let server = MockServer::start().await;
        login_devuelve(&server, "t1", 1).await;
        Mock::given(method("POST"))
            .and(path("/api/endpoints/v1/bloquear-asientos"))
            .and(header("authorization", "Bearer t1"))
            .and(body_json(json!({ "eventoId": 7, "asientos": [{ "fila": 1, "columna": 2 }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(bloqueo_ok()))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let respuesta = client.bloquear_asientos(7, &[Asiento::new(1, 2)]).await.unwrap();
        assert!(respuesta.exitoso());

        // The token is reused.
        client.bloquear_asientos(7, &[Asiento::new(1, 2)]).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token_triggers_one_new_login() {
        let server = MockServer::start().await;
        login_devuelve(&server, "viejo", 1).await;
        login_devuelve(&server, "nuevo", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/endpoints/v1/eventos"))
            .and(header("authorization", "Bearer viejo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/endpoints/v1/eventos"))
            .and(header("authorization", "Bearer nuevo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 3, "titulo": "Recital", "filaAsientos": 5, "columnAsientos": 5 }
            ])))
            .mount(&server)
            .await;

        let eventos = client(&server).eventos().await.unwrap();
        assert_eq!(eventos.len(), 1);
        assert_eq!(eventos[0].titulo, "Recital");
    }

    #[tokio::test]
    async fn second_rejection_is_unauthorized() {
        let server = MockServer::start().await;
        login_devuelve(&server, "t", 2).await;
        Mock::given(method("GET"))
            .and(path("/api/endpoints/v1/eventos"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let error = client(&server).eventos().await.unwrap_err();
        assert_eq!(error, GatewayError::Unauthorized);
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let server = MockServer::start().await;
        login_devuelve(&server, "t", 1).await;
        Mock::given(method("POST"))
            .and(path("/api/endpoints/v1/realizar-venta"))
            .respond_with(ResponseTemplate::new(503).set_body_string("mantenimiento"))
            .mount(&server)
            .await;

        let request = RealizarVentaRequest {
            evento_id: 7,
            fecha: chrono::Utc::now(),
            precio_venta: evento_core::types::Money::from_cents(1000),
            asientos: Vec::new(),
        };
        let error = client(&server).realizar_venta(&request).await.unwrap_err();
        assert!(matches!(error, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn client_errors_keep_status_and_body() {
        let server = MockServer::start().await;
        login_devuelve(&server, "t", 1).await;
        Mock::given(method("POST"))
            .and(path("/api/endpoints/v1/bloquear-asientos"))
            .respond_with(ResponseTemplate::new(400).set_body_string("evento inexistente"))
            .mount(&server)
            .await;

        let error = client(&server)
            .bloquear_asientos(99, &[Asiento::new(1, 1)])
            .await
            .unwrap_err();
        assert_eq!(
            error,
            GatewayError::Status {
                status: 400,
                body: "evento inexistente".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unreadable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        login_devuelve(&server, "t", 1).await;
        Mock::given(method("GET"))
            .and(path("/api/endpoints/v1/eventos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let error = client(&server).eventos().await.unwrap_err();
        assert!(matches!(error, GatewayError::Decode(_)));
    }

    #[tokio::test]
    async fn health_needs_no_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/management/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "UP" })))
            .mount(&server)
            .await;

        client(&server).health().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client =
            CatedraClient::new("http://127.0.0.1:1", "a", "b", Duration::from_millis(200)).unwrap();
        assert!(matches!(client.health().await, Err(GatewayError::Unavailable(_))));
    }
}
