//! Redis client wrapper
//!
//! Holds a [`ConnectionManager`], which reconnects on its own after Redis
//! restarts, and is cheap to clone into request handlers.
//!
//! # Example
//!
//! ```no_run
//! use storecraft_shared::redis::{RedisClient, RedisConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedisClient::new(RedisConfig::new("redis://127.0.0.1:6379")).await?;
//! assert!(client.ping().await?);
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis command timed out")]
    Timeout,
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::ConnectionError(err.to_string())
        } else {
            RedisClientError::CommandError(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,

    /// Upper bound for a single command, including reconnect time
    pub command_timeout_ms: u64,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_ms: 250,
        }
    }
}

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL or when the first connection cannot be made.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisClientError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %sanitize_url(&config.url), "Connected to Redis");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// A connection handle; clones share the underlying multiplexed connection
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.config.command_timeout_ms)
    }

    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.connection();

        let pong: String = tokio::time::timeout(
            self.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::Timeout)??;

        Ok(pong == "PONG")
    }
}

/// Hides credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
        if at_pos > scheme_end {
            return format!("{}***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
