//! Backend selection

use crate::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, RedisCheckpointStore,
    SledCheckpointStore, DEFAULT_CHECKPOINT_FILE, DEFAULT_CHECKPOINT_KEY,
};
use feed_core::StorageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which backend holds the checkpoint, and its parameters
///
/// Deserializes from a `[checkpoint]` table tagged by `backend`:
/// ```toml
/// [checkpoint]
/// backend = "redis"
/// url = "redis://localhost:6379"
/// key = "mongoListenerLastOp"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    File {
        #[serde(default = "default_file")]
        path: PathBuf,
    },
    Redis {
        url: String,
        #[serde(default = "default_key")]
        key: String,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
        #[serde(default = "default_response_timeout_ms")]
        response_timeout_ms: u64,
    },
    Sled {
        path: PathBuf,
        #[serde(default = "default_key")]
        key: String,
    },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_file(),
        }
    }
}

fn default_file() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_FILE)
}

fn default_key() -> String {
    DEFAULT_CHECKPOINT_KEY.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    crate::remote::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_response_timeout_ms() -> u64 {
    crate::remote::DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64
}

impl StoreConfig {
    /// Redis backend with default timeouts
    pub fn redis(url: impl Into<String>, key: impl Into<String>) -> Self {
        StoreConfig::Redis {
            url: url.into(),
            key: key.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }

    /// Short backend name
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Redis { .. } => "redis",
            StoreConfig::Sled { .. } => "sled",
            StoreConfig::Memory => "memory",
        }
    }

    /// Construct the configured store
    pub fn open(&self) -> Result<Arc<dyn CheckpointStore>, StorageError> {
        let store: Arc<dyn CheckpointStore> = match self {
            StoreConfig::File { path } => Arc::new(FileCheckpointStore::new(path.clone())),
            StoreConfig::Redis {
                url,
                key,
                connect_timeout_ms,
                response_timeout_ms,
            } => Arc::new(RedisCheckpointStore::new(url, key.clone())?.with_timeouts(
                Duration::from_millis(*connect_timeout_ms),
                Duration::from_millis(*response_timeout_ms),
            )),
            StoreConfig::Sled { path, key } => Arc::new(SledCheckpointStore::open(path, key.clone())?),
            StoreConfig::Memory => Arc::new(MemoryCheckpointStore::new()),
        };
        Ok(store)
    }
}
