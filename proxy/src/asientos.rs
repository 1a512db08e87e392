//! Seat maps published by cátedra in its Redis.
//!
//! Cátedra stores one JSON document per event at `evento_{id}`. The proxy
//! hands the document out untouched; the backend parses it.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use thiserror::Error;

/// Seat store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection or command failure
    #[error("seat store error: {0}")]
    Redis(String),

    /// No answer within the configured timeout
    #[error("seat store timed out after {0:?}")]
    Timeout(Duration),
}

/// Read access to the seat maps.
#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Raw seat map of a cátedra event, `None` when nothing is published.
    async fn asientos(&self, evento_id: i64) -> Result<Option<String>, StoreError>;
}

/// Key of an event's seat map.
#[must_use]
pub fn key(evento_id: i64) -> String {
    format!("evento_{evento_id}")
}

/// [`SeatStore`] over cátedra's Redis.
#[derive(Clone)]
pub struct RedisSeatStore {
    conn_manager: ConnectionManager,
    timeout: Duration,
}

impl RedisSeatStore {
    /// Connects to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the URL is malformed or the server does not
    /// answer in time.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| StoreError::Redis(e.to_string()))?;
        let conn_manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(timeout))?
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        tracing::info!("Connected to cátedra Redis");
        Ok(Self { conn_manager, timeout })
    }
}

#[async_trait]
impl SeatStore for RedisSeatStore {
    async fn asientos(&self, evento_id: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = tokio::time::timeout(self.timeout, conn.get(key(evento_id)))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(|e| StoreError::Redis(e.to_string()))?;
        Ok(raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_catedra_layout() {
        assert_eq!(key(501), "evento_501");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn reads_published_map() {
        let store = RedisSeatStore::connect("redis://127.0.0.1:6379", Duration::from_secs(2))
            .await
            .expect("Redis should be running");
        let mut conn = store.conn_manager.clone();
        let documento = r#"{"eventoId":990001,"asientos":[]}"#;
        let _: () = conn.set_ex(key(990_001), documento, 60).await.unwrap();

        assert_eq!(store.asientos(990_001).await.unwrap().as_deref(), Some(documento));
        assert_eq!(store.asientos(990_002).await.unwrap(), None);

        let _: i64 = conn.del(key(990_001)).await.unwrap();
    }
}
