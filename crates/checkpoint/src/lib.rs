//! Checkpoint persistence for the change-feed consumer
//!
//! A checkpoint is a single slot holding the last feed position the
//! consumer got past. Backends:
//! - Local file (default `lastop.json`)
//! - Embedded key-value entry (sled)
//! - Network key-value entry (Redis)
//! - In-memory (tests, dry runs)

pub mod backend;
pub mod embedded;
pub mod file;
pub mod memory;
pub mod remote;

use async_trait::async_trait;
use feed_core::{Position, StorageError};

// Re-exports
pub use backend::StoreConfig;
pub use embedded::SledCheckpointStore;
pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use remote::RedisCheckpointStore;

/// Default checkpoint file name
pub const DEFAULT_CHECKPOINT_FILE: &str = "lastop.json";

/// Default key for key-value backends
pub const DEFAULT_CHECKPOINT_KEY: &str = "mongoListenerLastOp";

/// Single-slot store for the last observed feed position
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the stored position. `Ok(None)` when nothing was ever saved.
    async fn load(&self) -> Result<Option<Position>, StorageError>;

    /// Overwrite the slot with `position`
    async fn save(&self, position: &Position) -> Result<(), StorageError>;

    /// Empty the slot so the next start performs a backfill
    async fn clear(&self) -> Result<(), StorageError>;

    /// Where the slot lives, for logs and `tailfeed status`
    fn describe(&self) -> String;
}
