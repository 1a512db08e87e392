//! Tells the backend to resynchronize its catalog.
//!
//! The proxy logs in to the backend with a service account and calls
//! `POST /api/eventos/sincronizar-todo`. Tokens are reused until shortly
//! before they expire.

use evento_runtime::retry::{RetryPolicy, retry_with_backoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lifetime assumed for a backend token.
const TOKEN_TTL: Duration = Duration::from_secs(23 * 60 * 60);

/// A token this close to expiry is renewed before use.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// Longest response body kept in an error.
const MAX_ERROR_BODY: usize = 256;

/// Notification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifierError {
    /// The backend could not be reached
    #[error("backend unreachable: {0}")]
    Transport(String),

    /// The backend refused the service account
    #[error("backend login failed with {status}: {body}")]
    Login {
        /// HTTP status
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The backend answered the sync request with an error
    #[error("backend sync failed with {status}: {body}")]
    Sync {
        /// HTTP status
        status: u16,
        /// Response body, truncated
        body: String,
    },
}

/// Outcome reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncResumen {
    /// Events created
    pub created: u64,
    /// Events updated
    pub updated: u64,
    /// Events deactivated
    pub deactivated: u64,
    /// Per-event failures
    pub errors: Vec<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct JwtToken {
    id_token: String,
}

struct CachedToken {
    valor: String,
    expira: Instant,
}

impl CachedToken {
    fn vigente(&self, now: Instant) -> bool {
        now + TOKEN_MARGIN < self.expira
    }
}

/// Backend client used on every change notification.
pub struct BackendNotifier {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<CachedToken>>,
    retry: RetryPolicy,
}

fn transport(error: &reqwest::Error) -> NotifierError {
    NotifierError::Transport(error.to_string())
}

async fn cuerpo(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut corte = MAX_ERROR_BODY;
        while !body.is_char_boundary(corte) {
            corte -= 1;
        }
        body.truncate(corte);
    }
    (status, body)
}

impl BackendNotifier {
    /// Creates a notifier for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| transport(&e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
            retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(500))
                .max_delay(Duration::from_secs(10))
                .build(),
        })
    }

    /// Replaces the backoff between notification attempts.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn login(&self) -> Result<CachedToken, NotifierError> {
        tracing::debug!(username = %self.username, "Logging in to backend");
        let response = self
            .http
            .post(format!("{}/api/authenticate", self.base_url))
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| transport(&e))?;

        if !response.status().is_success() {
            let (status, body) = cuerpo(response).await;
            return Err(NotifierError::Login { status, body });
        }
        let jwt: JwtToken = response.json().await.map_err(|e| transport(&e))?;
        Ok(CachedToken {
            valor: jwt.id_token,
            expira: Instant::now() + TOKEN_TTL,
        })
    }

    async fn token(&self) -> Result<String, NotifierError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.vigente(Instant::now())) {
            return Ok(token.valor.clone());
        }
        let token = self.login().await?;
        let valor = token.valor.clone();
        *slot = Some(token);
        Ok(valor)
    }

    async fn invalidar(&self, rechazado: &str) {
        let mut slot = self.token.lock().await;
        if slot.as_ref().is_some_and(|t| t.valor == rechazado) {
            *slot = None;
        }
    }

    async fn enviar(&self, token: &str) -> Result<reqwest::Response, NotifierError> {
        self.http
            .post(format!("{}/api/eventos/sincronizar-todo", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport(&e))
    }

    /// One sync request, logging in again once on a 401.
    async fn sincronizar(&self) -> Result<SyncResumen, NotifierError> {
        let token = self.token().await?;
        let mut response = self.enviar(&token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Backend rejected the token, logging in again");
            self.invalidar(&token).await;
            let token = self.token().await?;
            response = self.enviar(&token).await?;
        }

        if !response.status().is_success() {
            let (status, body) = cuerpo(response).await;
            return Err(NotifierError::Sync { status, body });
        }
        response.json().await.map_err(|e| transport(&e))
    }

    /// Asks the backend to resynchronize, retrying with backoff.
    ///
    /// # Errors
    ///
    /// The error of the last attempt once the retries are exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn notificar(&self) -> Result<SyncResumen, NotifierError> {
        let resultado = retry_with_backoff(self.retry.clone(), || self.sincronizar()).await;
        match &resultado {
            Ok(resumen) => {
                metrics::counter!("proxy.notificaciones", "resultado" => "ok").increment(1);
                tracing::info!(
                    created = resumen.created,
                    updated = resumen.updated,
                    deactivated = resumen.deactivated,
                    errors = resumen.errors.len(),
                    "Backend catalog synchronized"
                );
            },
            Err(e) => {
                metrics::counter!("proxy.notificaciones", "resultado" => "error").increment(1);
                tracing::error!(error = %e, "Backend notification failed");
            },
        }
        resultado
    }
}
