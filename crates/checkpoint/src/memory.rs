//! In-memory checkpoint, lost on exit

use crate::CheckpointStore;
use async_trait::async_trait;
use feed_core::{Position, StorageError};
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryCheckpointStore {
    slot: Mutex<Option<Position>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a position already stored (simulated restart)
    pub fn with_position(position: Position) -> Self {
        Self {
            slot: Mutex::new(Some(position)),
        }
    }

    pub fn current(&self) -> Option<Position> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Position>, StorageError> {
        Ok(self.current())
    }

    async fn save(&self, position: &Position) -> Result<(), StorageError> {
        *self.slot.lock() = Some(position.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
