//! Downstream collaborator interfaces

use crate::{Document, DocumentId, ProcessingError};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves documents by id for the Processor's supplementary lookups
#[async_trait]
pub trait DocGetter: Send + Sync {
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, ProcessingError>;
}

/// The document transformation stage fed by the consumer
///
/// Implementations must tolerate redelivery: the live path is
/// at-least-once and a restart may replay recent events.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Transform one document. `is_backfill` is true during the cold-start scan.
    async fn process_doc(&self, document: Document, is_backfill: bool) -> Result<(), ProcessingError>;

    /// Install the id resolver supplied by the composition root
    fn set_doc_getter(&self, _getter: Arc<dyn DocGetter>) {}

    /// Work the Processor has accepted but not finished
    fn queue_depth(&self) -> usize {
        0
    }
}
