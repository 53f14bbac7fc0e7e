//! Default processor: one JSON line per document
//!
//! Writes `{"backfill": bool, "document": {...}}` to a sink (stdout in
//! production) so tailfeed can feed any line-oriented consumer.

use async_trait::async_trait;
use feed_core::{DocGetter, Document, ProcessingError, Processor};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

#[derive(Serialize)]
struct Line<'a> {
    backfill: bool,
    document: &'a Document,
}

pub struct JsonLinesProcessor<W> {
    sink: Mutex<W>,
    waiting: AtomicUsize,
    getter: RwLock<Option<Arc<dyn DocGetter>>>,
}

impl JsonLinesProcessor<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesProcessor<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            waiting: AtomicUsize::new(0),
            getter: RwLock::new(None),
        }
    }

    /// The installed id resolver, if any
    pub fn doc_getter(&self) -> Option<Arc<dyn DocGetter>> {
        self.getter.read().clone()
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

#[async_trait]
impl<W> Processor for JsonLinesProcessor<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn process_doc(&self, document: Document, is_backfill: bool) -> Result<(), ProcessingError> {
        let mut line = serde_json::to_vec(&Line {
            backfill: is_backfill,
            document: &document,
        })
        .map_err(|e| ProcessingError::new(format!("serialize: {}", e)))?;
        line.push(b'\n');

        self.waiting.fetch_add(1, Ordering::Relaxed);
        let result = async {
            let mut sink = self.sink.lock().await;
            sink.write_all(&line).await?;
            sink.flush().await
        }
        .await;
        self.waiting.fetch_sub(1, Ordering::Relaxed);

        result.map_err(|e| ProcessingError::new(format!("write: {}", e)))
    }

    fn set_doc_getter(&self, getter: Arc<dyn DocGetter>) {
        *self.getter.write() = Some(getter);
    }

    /// Documents waiting for the sink
    fn queue_depth(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }
}
