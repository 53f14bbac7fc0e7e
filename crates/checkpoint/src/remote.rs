//! Redis-backed checkpoint
//!
//! One key holds the serialized position. The connection is opened on first
//! use and reused afterwards; a failed connect is retried on the next call.
//! Connect and command round-trips are both bounded, so an unresponsive
//! server surfaces as a backend error instead of a stalled caller.

use crate::CheckpointStore;
use async_trait::async_trait;
use feed_core::{Position, StorageError};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default bound on establishing the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single command round-trip
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Checkpoint stored under a single Redis key
pub struct RedisCheckpointStore {
    client: redis::Client,
    key: String,
    connect_timeout: Duration,
    response_timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCheckpointStore {
    /// Validate the URL; no connection is made yet
    pub fn new(url: &str, key: impl Into<String>) -> Result<Self, StorageError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        Ok(Self {
            client,
            key: key.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            connection: Mutex::new(None),
        })
    }

    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        debug!(key = %self.key, "Connecting to redis checkpoint backend");
        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(self.response_timeout, self.connect_timeout)
            .await
            .map_err(backend_error)?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Drop a connection that just failed so the next call reconnects
    async fn reset(&self) {
        *self.connection.lock().await = None;
    }
}

fn backend_error(e: redis::RedisError) -> StorageError {
    StorageError::Backend {
        backend: "redis",
        message: e.to_string(),
    }
}

#[async_trait]
impl CheckpointStore for RedisCheckpointStore {
    async fn load(&self) -> Result<Option<Position>, StorageError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = match conn.get(&self.key).await {
            Ok(v) => v,
            Err(e) => {
                self.reset().await;
                return Err(backend_error(e));
            }
        };

        match value {
            Some(raw) if !raw.trim().is_empty() => Position::decode(&raw).map(Some),
            _ => Ok(None),
        }
    }

    async fn save(&self, position: &Position) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        if let Err(e) = conn.set::<_, _, ()>(&self.key, position.encode()).await {
            self.reset().await;
            return Err(backend_error(e));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        if let Err(e) = conn.del::<_, ()>(&self.key).await {
            self.reset().await;
            return Err(backend_error(e));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        let info = self.client.get_connection_info();
        format!("redis {} key {}", info.addr, self.key)
    }
}
