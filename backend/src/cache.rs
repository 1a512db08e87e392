//! Redis session cache.
//!
//! One key per buyer, `{prefix}{usuario_id}`, holding the JSON
//! [`SesionCacheEntry`] of the open session. Redis expiry is the session
//! idle timeout, so `TTL` on the key is the time the buyer has left.

use async_trait::async_trait;
use chrono::Duration;
use evento_core::repository::{RepositoryError, Result, SesionCache, SesionCacheEntry};
use evento_core::types::UsuarioId;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// [`SesionCache`] backed by Redis.
#[derive(Clone)]
pub struct RedisSesionCache {
    conn_manager: ConnectionManager,
    prefix: String,
}

fn storage(contexto: &str, error: &redis::RedisError) -> RepositoryError {
    RepositoryError::Storage(format!("{contexto}: {error}"))
}

impl RedisSesionCache {
    /// Connects to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when the URL is malformed or the
    /// server cannot be reached.
    pub async fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| storage("invalid Redis URL", &e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| storage("Redis connection failed", &e))?;

        tracing::info!("Session cache connected to Redis");
        Ok(Self {
            conn_manager,
            prefix: prefix.into(),
        })
    }

    fn key(&self, usuario: UsuarioId) -> String {
        format!("{}{usuario}", self.prefix)
    }

    /// `PING`, for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when Redis does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| storage("Redis ping failed", &e))?;
        Ok(())
    }
}

#[async_trait]
impl SesionCache for RedisSesionCache {
    async fn get(&self, usuario: UsuarioId) -> Result<Option<SesionCacheEntry>> {
        let mut conn = self.conn_manager.clone();
        let key = self.key(usuario);
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| storage("session cache read failed", &e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable session cache entry ignored");
                Ok(None)
            },
        }
    }

    async fn put(&self, entry: &SesionCacheEntry, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = self.key(entry.user_id);
        let body = serde_json::to_string(entry)
            .map_err(|e| RepositoryError::Storage(format!("session cache encode failed: {e}")))?;
        let ttl_seconds = u64::try_from(ttl.num_seconds().max(1)).unwrap_or(1);

        let _: () = conn
            .set_ex(&key, body, ttl_seconds)
            .await
            .map_err(|e| storage("session cache write failed", &e))?;

        tracing::debug!(key = %key, ttl_seconds, sesion_id = %entry.sesion_id, "Session cached");
        Ok(())
    }

    async fn remove(&self, usuario: UsuarioId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn
            .del(self.key(usuario))
            .await
            .map_err(|e| storage("session cache delete failed", &e))?;
        Ok(())
    }

    async fn ttl_restante(&self, usuario: UsuarioId) -> Result<Option<i64>> {
        let mut conn = self.conn_manager.clone();
        // -2 when the key is missing, -1 when it has no expiry.
        let ttl: i64 = conn
            .ttl(self.key(usuario))
            .await
            .map_err(|e| storage("session cache TTL failed", &e))?;
        Ok((ttl >= 0).then_some(ttl))
    }
}
