//! Seat snapshots served by the proxy.

use super::{decode, unavailable};
use async_trait::async_trait;
use evento_core::catedra::GatewayError;
use evento_core::disponibilidad::{SeatFeed, SnapshotAsientos};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// [`SeatFeed`] reading `GET {proxy}/api/proxy/asientos/{id}`.
pub struct ProxySeatFeed {
    http: Client,
    base_url: String,
}

impl ProxySeatFeed {
    /// Creates a feed for the proxy at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable(&e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SeatFeed for ProxySeatFeed {
    async fn snapshot(
        &self,
        evento_id_catedra: i64,
    ) -> Result<Option<SnapshotAsientos>, GatewayError> {
        let response = self
            .http
            .get(format!("{}/api/proxy/asientos/{evento_id_catedra}", self.base_url))
            .send()
            .await
            .map_err(|e| unavailable(&e))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(evento_id_catedra, "No seat snapshot published yet");
            return Ok(None);
        }
        decode(response).await.map(Some)
    }
}
