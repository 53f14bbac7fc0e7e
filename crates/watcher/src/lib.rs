//! Change-feed consumption for tailfeed
//!
//! This crate provides the consumer side of the feed:
//! - Write-back filtering of field-level diffs
//! - Bounded-concurrency backfill of a whole collection
//! - The resumable watcher state machine with monotonic checkpoints
//! - Shared run status for the status surface

pub mod backfill;
pub mod feed;
pub mod filter;
pub mod shutdown;
pub mod status;

pub use backfill::{BackfillReport, BackfillScanner, DEFAULT_CONCURRENCY};
pub use feed::{ChangeFeedWatcher, WatchError, WatcherConfig};
pub use filter::{FeedFilter, FilterError, FilterRule, DEFAULT_IGNORED_FIELDS};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use status::{BackfillSnapshot, FeedState, FeedStatus, StatusSnapshot};
