//! Configuration of the proxy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {var}: {value}")]
pub struct ConfigError {
    /// Variable name
    pub var: &'static str,
    /// Offending value
    pub value: String,
}

/// Proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port
    pub port: u16,
    /// Cátedra's Redis, holding the seat maps
    pub redis: RedisConfig,
    /// Change notification topic
    pub kafka: KafkaConfig,
    /// Backend to notify
    pub backend: BackendConfig,
}

/// Cátedra Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    pub url: String,
    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,
}

/// Kafka consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Bootstrap servers, comma separated
    pub brokers: String,
    /// Topic cátedra publishes on
    pub topic: String,
    /// Consumer group
    pub group_id: String,
    /// `latest` or `earliest`
    pub auto_offset_reset: String,
}

/// Backend service account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Service account
    pub username: String,
    /// Service account password
    #[serde(skip_serializing)]
    pub password: String,
}

impl RedisConfig {
    /// Per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl BackendConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source. Every variable
    /// has a default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let text = |var: &str, default: &str| get(var).unwrap_or_else(|| default.to_string());
        let parse = |var: &'static str, default: u64| match get(var) {
            None => Ok(default),
            Some(value) => parse_value(var, value),
        };

        Ok(Self {
            port: match get("SERVER_PORT") {
                None => 8082,
                Some(value) => parse_value("SERVER_PORT", value)?,
            },
            redis: RedisConfig {
                url: text("CATEDRA_REDIS_URL", "redis://127.0.0.1:6379"),
                timeout_ms: parse("CATEDRA_REDIS_TIMEOUT_MS", 2000)?,
            },
            kafka: KafkaConfig {
                brokers: text("KAFKA_BROKERS", "localhost:9092"),
                topic: text("KAFKA_TOPIC", "eventos-actualizacion"),
                group_id: text("KAFKA_GROUP_ID", evento_redpanda::DEFAULT_GROUP_ID),
                auto_offset_reset: text(
                    "KAFKA_AUTO_OFFSET_RESET",
                    evento_redpanda::DEFAULT_AUTO_OFFSET_RESET,
                ),
            },
            backend: BackendConfig {
                base_url: text("BACKEND_BASE_URL", "http://localhost:8081"),
                timeout_ms: parse("BACKEND_TIMEOUT_MS", 5000)?,
                username: text("BACKEND_USERNAME", "proxy-service"),
                password: text("BACKEND_PASSWORD", "user"),
            },
        })
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError { var, value })
}
