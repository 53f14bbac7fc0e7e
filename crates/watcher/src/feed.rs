//! The change-feed state machine
//!
//! `ResolvingPosition -> (Backfilling) -> Streaming -> {Error, Stopped}`
//!
//! The live path is strictly sequential: each event is filtered, forwarded
//! and checkpointed before the next one is pulled from the subscription.

use crate::backfill::{BackfillScanner, DEFAULT_CONCURRENCY};
use crate::filter::FeedFilter;
use crate::shutdown::Shutdown;
use crate::status::{FeedState, FeedStatus};
use checkpoint::CheckpointStore;
use feed_core::{
    ConnectionError, DocumentSource, MutationEvent, MutationSource, Position, Processor, ScanError,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures that end a run
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Lifecycle knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Scan the whole collection when no checkpoint exists
    pub backfill_enabled: bool,
    /// Maximum concurrent Processor calls during backfill
    pub backfill_concurrency: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backfill_enabled: true,
            backfill_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Drives one consumer run against a mutation source
pub struct ChangeFeedWatcher {
    source: Arc<dyn MutationSource>,
    scan_source: Arc<dyn DocumentSource>,
    processor: Arc<dyn Processor>,
    store: Arc<dyn CheckpointStore>,
    filter: FeedFilter,
    config: WatcherConfig,
    status: Arc<FeedStatus>,
    shutdown: Shutdown,
    /// Highest position written to the store during this run
    last_saved: Mutex<Option<Position>>,
}

impl ChangeFeedWatcher {
    pub fn new(
        source: Arc<dyn MutationSource>,
        scan_source: Arc<dyn DocumentSource>,
        processor: Arc<dyn Processor>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            source,
            scan_source,
            processor,
            store,
            filter: FeedFilter::with_default_rules(),
            config: WatcherConfig::default(),
            status: Arc::new(FeedStatus::new()),
            shutdown: Shutdown::never(),
            last_saved: Mutex::new(None),
        }
    }

    pub fn with_filter(mut self, filter: FeedFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_status(mut self, status: Arc<FeedStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    pub fn state(&self) -> FeedState {
        self.status.state()
    }

    /// Resolve a starting point and run until stopped or failed.
    ///
    /// Returns `Ok` only after an external stop. The subscription ending or
    /// failing, and the backfill source failing, are returned as errors.
    pub async fn run(&self) -> Result<(), WatchError> {
        self.status.set_state(FeedState::ResolvingPosition);

        match self.resolve_position().await {
            Some(position) => {
                info!(position = %position, "Resuming from stored checkpoint");
                *self.last_saved.lock() = Some(position.clone());
                self.status.set_last_position(position.clone());
                self.start(Some(position)).await?;
            }
            None if self.config.backfill_enabled => {
                info!("No checkpoint found, backfilling before streaming");
                if !self.backfill().await? {
                    self.status.set_state(FeedState::Stopped);
                    return Ok(());
                }
                self.start(None).await?;
            }
            None => {
                info!("No checkpoint found and backfill disabled, streaming from now");
                self.start(None).await?;
            }
        }

        Ok(())
    }

    /// A load failure is treated the same as an empty store
    async fn resolve_position(&self) -> Option<Position> {
        match self.store.load().await {
            Ok(position) => position,
            Err(e) => {
                warn!(
                    store = %self.store.describe(),
                    error = %e,
                    "Failed to load checkpoint, continuing as if none was stored"
                );
                None
            }
        }
    }

    /// Run the scanner to completion. `Ok(false)` means a stop was requested.
    async fn backfill(&self) -> Result<bool, ScanError> {
        self.status.set_state(FeedState::Backfilling);

        let stream = match self.scan_source.scan().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to open backfill cursor");
                self.status.set_state(FeedState::Error);
                return Err(e);
            }
        };

        let scanner = BackfillScanner::new(Arc::clone(&self.processor), self.config.backfill_concurrency)
            .with_status(Arc::clone(&self.status))
            .with_shutdown(self.shutdown.clone());

        match scanner.run(stream).await {
            Ok(report) => Ok(!report.interrupted),
            Err(e) => {
                self.status.set_state(FeedState::Error);
                Err(e)
            }
        }
    }

    /// Subscribe at `initial` (or "now") and stream until stopped or failed
    pub async fn start(&self, initial: Option<Position>) -> Result<(), ConnectionError> {
        let mut shutdown = self.shutdown.clone();
        if shutdown.is_requested() {
            self.status.set_state(FeedState::Stopped);
            return Ok(());
        }

        let mut stream = match self.source.subscribe(initial.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(source = %self.source.describe(), error = %e, "Failed to open change stream");
                self.status.set_state(FeedState::Error);
                return Err(e);
            }
        };

        self.status.set_state(FeedState::Streaming);
        match &initial {
            Some(position) => info!(source = %self.source.describe(), from = %position, "Streaming changes"),
            None => info!(source = %self.source.describe(), "Streaming changes from now"),
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Stop requested, closing change stream");
                    self.status.set_state(FeedState::Stopped);
                    return Ok(());
                }
                next = stream.next() => next,
            };

            match next {
                // Not raced against shutdown: a forward always runs to completion
                Some(Ok(event)) => self.handle_event(event).await,
                Some(Err(e)) => {
                    error!(error = %e, "Change stream failed");
                    self.status.set_state(FeedState::Error);
                    return Err(e);
                }
                None => {
                    error!("Change stream closed by the upstream");
                    self.status.set_state(FeedState::Error);
                    return Err(ConnectionError::Closed);
                }
            }
        }
    }

    async fn handle_event(&self, event: MutationEvent) {
        if !self.filter.should_forward(&event.changed_fields) {
            debug!(
                doc_id = %event.document_id,
                position = %event.position,
                kind = %event.kind,
                fields = ?event.changed_fields,
                "Dropping write-back mutation"
            );
            self.status.record_dropped();
            return;
        }

        debug!(
            doc_id = %event.document_id,
            position = %event.position,
            kind = %event.kind,
            "Forwarding mutation"
        );

        match self.processor.process_doc(event.forward_document(), false).await {
            Ok(()) => self.status.record_forwarded(),
            Err(e) => {
                warn!(
                    doc_id = %event.document_id,
                    position = %event.position,
                    kind = %event.kind,
                    error = %e,
                    "Processor rejected mutation"
                );
                self.status.record_processing_failure();
            }
        }

        self.advance_checkpoint(event.position).await;
    }

    /// Save `position` unless it would move the checkpoint backwards
    async fn advance_checkpoint(&self, position: Position) {
        if let Some(saved) = self.last_saved.lock().as_ref() {
            if position <= *saved {
                debug!(position = %position, saved = %saved, "Skipping non-advancing checkpoint");
                return;
            }
        }

        match self.store.save(&position).await {
            Ok(()) => {
                self.status.set_last_position(position.clone());
                *self.last_saved.lock() = Some(position);
            }
            Err(e) => {
                warn!(
                    store = %self.store.describe(),
                    position = %position,
                    error = %e,
                    "Failed to save checkpoint"
                );
                self.status.record_checkpoint_failure();
            }
        }
    }
}
