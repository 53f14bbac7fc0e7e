//! Change-stream mutation source

use crate::connection::MongoHandle;
use crate::convert::{mutation_from_change, resume_point, ResumePoint};
use crate::pipeline::change_stream_pipeline;
use async_trait::async_trait;
use feed_core::{ConnectionError, MutationSource, MutationStream, Position};
use futures::StreamExt;
use mongodb::bson::Document;
use mongodb::options::{ChangeStreamOptions, FullDocumentType};
use tracing::{debug, info};
use watcher::FilterRule;

/// Watches one collection, attaching the current document to updates
pub struct ChangeStreamSource {
    handle: MongoHandle,
    rules: Vec<FilterRule>,
}

impl ChangeStreamSource {
    pub fn new(handle: MongoHandle, rules: Vec<FilterRule>) -> Self {
        Self { handle, rules }
    }

    fn options(from: Option<&Position>) -> Result<ChangeStreamOptions, ConnectionError> {
        let (resume_after, start_at) = match from.map(resume_point).transpose()? {
            Some(ResumePoint::After(token)) => (Some(token), None),
            Some(ResumePoint::At(ts)) => (None, Some(ts)),
            None => (None, None),
        };

        Ok(ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .resume_after(resume_after)
            .start_at_operation_time(start_at)
            .build())
    }
}

#[async_trait]
impl MutationSource for ChangeStreamSource {
    async fn subscribe(&self, from: Option<Position>) -> Result<MutationStream, ConnectionError> {
        let pipeline = change_stream_pipeline(self.handle.collection_name(), &self.rules);
        let options = Self::options(from.as_ref())?;

        let changes = self
            .handle
            .collection()
            .watch(pipeline, options)
            .await
            .map_err(|e| ConnectionError::Subscribe {
                target: self.handle.namespace(),
                message: e.to_string(),
            })?
            .with_type::<Document>();

        info!(namespace = %self.handle.namespace(), "Change stream opened");

        let events = changes.filter_map(|change| async move {
            match change {
                Ok(raw) => match mutation_from_change(&raw) {
                    Ok(Some(event)) => Some(Ok(event)),
                    Ok(None) => {
                        debug!(operation = ?raw.get_str("operationType").ok(), "Skipping non-document change");
                        None
                    }
                    Err(e) => Some(Err(e)),
                },
                Err(e) => Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        });

        Ok(events.boxed())
    }

    fn describe(&self) -> String {
        self.handle.namespace()
    }
}
