//! Cold-start backfill
//!
//! Drains a full-collection cursor through the Processor with a bounded
//! number of calls in flight. Pulling from the cursor waits for a free slot,
//! so the cursor is never read further ahead than the Processor can absorb.

use crate::shutdown::Shutdown;
use crate::status::FeedStatus;
use chrono::{DateTime, Utc};
use feed_core::{DocumentId, DocumentStream, Processor, ScanError};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default number of concurrent Processor calls
pub const DEFAULT_CONCURRENCY: usize = 5000;

/// Log a progress line every this many returned documents
const PROGRESS_INTERVAL: u64 = 10_000;

/// Progress of one scan; discarded when the scan ends
#[derive(Debug)]
pub struct BackfillProgress {
    processed: AtomicU64,
    failed: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl BackfillProgress {
    fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Processor calls that have returned, successfully or not
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one returned call; yields the new total
    fn record(&self, ok: bool) -> u64 {
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.processed.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Outcome of a scan that was not aborted by its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: u64,
    pub failed: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// A stop was requested before the source was exhausted
    pub interrupted: bool,
}

/// Bounded fan-out over a document stream
pub struct BackfillScanner {
    processor: Arc<dyn Processor>,
    concurrency: usize,
    status: Arc<FeedStatus>,
    shutdown: Shutdown,
}

impl BackfillScanner {
    pub fn new(processor: Arc<dyn Processor>, concurrency: usize) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
            status: Arc::new(FeedStatus::new()),
            shutdown: Shutdown::never(),
        }
    }

    pub fn with_status(mut self, status: Arc<FeedStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drain `source`, returning only after every dispatched call returned.
    ///
    /// Processing failures are counted and logged. A failing source stops
    /// dispatch and yields a [`ScanError`] carrying the processed count.
    pub async fn run(&self, mut source: DocumentStream) -> Result<BackfillReport, ScanError> {
        let progress = Arc::new(BackfillProgress::new());
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut shutdown = self.shutdown.clone();
        let mut source_error = None;
        let mut interrupted = false;

        self.status.backfill_started(progress.started_at());
        info!(concurrency = self.concurrency, "Starting backfill of entire collection");

        loop {
            if shutdown.is_requested() {
                interrupted = true;
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    interrupted = true;
                    break;
                }
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // The semaphore is never closed
                    Err(_) => break,
                },
            };

            // Reap finished tasks so the set stays bounded
            while let Some(joined) = tasks.try_join_next() {
                self.reap(joined);
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    interrupted = true;
                    break;
                }
                next = source.next() => next,
            };

            let document = match next {
                Some(Ok(document)) => document,
                Some(Err(e)) => {
                    source_error = Some(e);
                    break;
                }
                None => break,
            };

            let processor = Arc::clone(&self.processor);
            let progress = Arc::clone(&progress);
            let status = Arc::clone(&self.status);
            status.backfill_dispatched();

            tasks.spawn(async move {
                let _permit = permit; // Hold the slot until the call returns
                let doc_id = DocumentId::of(&document);
                let result = processor.process_doc(document, true).await;

                let ok = result.is_ok();
                if let Err(e) = result {
                    warn!(
                        doc_id = %doc_id.map(|id| id.to_string()).unwrap_or_default(),
                        error = %e,
                        "Backfill failed to process document"
                    );
                }
                let total = progress.record(ok);
                status.backfill_returned(ok);

                if total % PROGRESS_INTERVAL == 0 {
                    info!(processed = total, "Backfill progress");
                }
            });
        }

        // Stop reading before waiting on the stragglers
        drop(source);
        while let Some(joined) = tasks.join_next().await {
            self.reap(joined);
        }

        let processed = progress.processed();
        if let Some(e) = source_error {
            error!(processed, error = %e, "Backfill source failed");
            return Err(e.with_processed(processed));
        }

        let report = BackfillReport {
            processed,
            failed: progress.failed.load(Ordering::Relaxed),
            started_at: progress.started_at(),
            elapsed: progress.started.elapsed(),
            interrupted,
        };

        let secs = report.elapsed.as_secs();
        if interrupted {
            info!(processed, "Backfill interrupted by shutdown");
        } else {
            info!(
                processed,
                failed = report.failed,
                "Entire collection processed ({} documents, {}m{}s)",
                processed,
                secs / 60,
                secs % 60
            );
        }

        Ok(report)
    }

    fn reap(&self, joined: Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            // A panicking Processor never returned; it is not counted as processed
            error!(error = %e, "Backfill task aborted");
            self.status.backfill_abandoned();
        }
    }
}
