//! Embedded key-value checkpoint using sled

use crate::CheckpointStore;
use async_trait::async_trait;
use feed_core::{Position, StorageError};
use sled::Db;
use std::path::Path;

/// Checkpoint kept under one key of a local sled database
pub struct SledCheckpointStore {
    /// Sled database
    db: Db,
    /// Key holding the serialized position
    key: String,
    /// Database directory, for `describe`
    location: String,
}

impl SledCheckpointStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path, key: impl Into<String>) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(backend_error)?;
        Ok(Self {
            db,
            key: key.into(),
            location: path.display().to_string(),
        })
    }
}

fn backend_error(e: sled::Error) -> StorageError {
    StorageError::Backend {
        backend: "sled",
        message: e.to_string(),
    }
}

#[async_trait]
impl CheckpointStore for SledCheckpointStore {
    async fn load(&self) -> Result<Option<Position>, StorageError> {
        let value = match self.db.get(self.key.as_bytes()).map_err(backend_error)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let raw = std::str::from_utf8(&value).map_err(|e| StorageError::Corrupt {
            detail: format!("non-utf8 value under {}: {}", self.key, e),
        })?;
        Position::decode(raw).map(Some)
    }

    async fn save(&self, position: &Position) -> Result<(), StorageError> {
        self.db
            .insert(self.key.as_bytes(), position.encode().into_bytes())
            .map_err(backend_error)?;

        // Flush to ensure durability
        self.db.flush_async().await.map_err(backend_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.db.remove(self.key.as_bytes()).map_err(backend_error)?;
        self.db.flush_async().await.map_err(backend_error)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sled {} key {}", self.location, self.key)
    }
}
