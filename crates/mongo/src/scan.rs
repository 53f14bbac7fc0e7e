//! Full-collection reads: the backfill cursor and by-id lookups

use crate::connection::MongoHandle;
use crate::convert::{id_to_bson, to_json};
use async_trait::async_trait;
use feed_core::{DocGetter, Document, DocumentId, DocumentSource, DocumentStream, ProcessingError, ScanError};
use futures::StreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use tracing::info;

/// Cursor batch size for the backfill scan
pub const DEFAULT_BATCH_SIZE: u32 = 5000;

/// Scans every document of the collection
pub struct CollectionScanSource {
    handle: MongoHandle,
    batch_size: u32,
}

impl CollectionScanSource {
    pub fn new(handle: MongoHandle) -> Self {
        Self {
            handle,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl DocumentSource for CollectionScanSource {
    async fn scan(&self) -> Result<DocumentStream, ScanError> {
        let options = FindOptions::builder().batch_size(self.batch_size).build();
        let cursor = self
            .handle
            .collection()
            .find(None, options)
            .await
            .map_err(|e| ScanError::upstream(format!("find on {}: {}", self.handle.namespace(), e)))?;

        info!(namespace = %self.handle.namespace(), batch_size = self.batch_size, "Backfill cursor opened");

        Ok(cursor
            .map(|item| item.map(to_json).map_err(|e| ScanError::upstream(e.to_string())))
            .boxed())
    }
}

/// Resolves documents by `_id` for the Processor
pub struct MongoDocGetter {
    handle: MongoHandle,
}

impl MongoDocGetter {
    pub fn new(handle: MongoHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl DocGetter for MongoDocGetter {
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, ProcessingError> {
        let filter = doc! { "_id": id_to_bson(id)? };
        let found = self
            .handle
            .collection()
            .find_one(filter, None)
            .await
            .map_err(|e| ProcessingError::new(format!("lookup of {} failed: {}", id, e)))?;
        Ok(found.map(to_json))
    }
}
