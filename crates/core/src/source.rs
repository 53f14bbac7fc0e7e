//! Upstream source interfaces
//!
//! The live feed and the full-collection scan are separate traits because
//! they are usually served by differently privileged connections.

use crate::{ConnectionError, Document, MutationEvent, Position, ScanError};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Live mutation stream; an `Err` item is a transport failure
pub type MutationStream = BoxStream<'static, Result<MutationEvent, ConnectionError>>;

/// Lazy, finite stream of every document in the collection
pub type DocumentStream = BoxStream<'static, Result<Document, ScanError>>;

/// Subscribes to the mutation log of one collection
#[async_trait]
pub trait MutationSource: Send + Sync {
    /// Open the feed just after `from`, or at the current end of the log
    /// when `from` is `None`.
    async fn subscribe(&self, from: Option<Position>) -> Result<MutationStream, ConnectionError>;

    /// Human-readable target (`db.collection`) for logs
    fn describe(&self) -> String;
}

/// Full scan of the collection for the cold-start backfill
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn scan(&self) -> Result<DocumentStream, ScanError>;
}
