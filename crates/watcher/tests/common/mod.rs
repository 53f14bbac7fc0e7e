//! In-memory collaborators for watcher integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use checkpoint::CheckpointStore;
use feed_core::{
    ConnectionError, Document, DocumentId, DocumentSource, DocumentStream, MutationEvent,
    MutationSource, MutationStream, OperationKind, Position, ProcessingError, Processor, ScanError,
    StorageError,
};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared record of collaborator calls, in the order they happened
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// An update event touching `fields`, with a full document attached
pub fn update(seconds: u32, ordinal: u32, id: &str, fields: &[&str]) -> MutationEvent {
    MutationEvent {
        kind: OperationKind::Update,
        document_id: DocumentId(json!(id)),
        full_document: Some(json!({"_id": id, "rev": ordinal})),
        changed_fields: fields.iter().map(|f| f.to_string()).collect(),
        position: Position::new(seconds, ordinal),
    }
}

pub fn delete(seconds: u32, ordinal: u32, id: &str) -> MutationEvent {
    MutationEvent {
        kind: OperationKind::Delete,
        document_id: DocumentId(json!(id)),
        full_document: None,
        changed_fields: BTreeSet::new(),
        position: Position::new(seconds, ordinal),
    }
}

/// Mutation source replaying a fixed script once
pub struct ScriptedSource {
    script: Mutex<Option<Vec<Result<MutationEvent, ConnectionError>>>>,
    hold_open: bool,
    subscriptions: Mutex<Vec<Option<Position>>>,
    journal: Journal,
}

impl ScriptedSource {
    pub fn new(events: Vec<MutationEvent>, journal: Journal) -> Self {
        Self::scripted(events.into_iter().map(Ok).collect(), journal)
    }

    pub fn scripted(script: Vec<Result<MutationEvent, ConnectionError>>, journal: Journal) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            hold_open: false,
            subscriptions: Mutex::new(Vec::new()),
            journal,
        }
    }

    /// Keep the stream open after the script instead of ending it
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn subscriptions(&self) -> Vec<Option<Position>> {
        self.subscriptions.lock().clone()
    }
}

#[async_trait]
impl MutationSource for ScriptedSource {
    async fn subscribe(&self, from: Option<Position>) -> Result<MutationStream, ConnectionError> {
        self.journal.push("subscribe");
        self.subscriptions.lock().push(from);

        let script = self.script.lock().take().unwrap_or_default();
        let events = stream::iter(script);
        if self.hold_open {
            Ok(events.chain(stream::pending()).boxed())
        } else {
            Ok(events.boxed())
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Collection of `total` synthetic documents, optionally failing part way
pub struct SyntheticDocuments {
    total: usize,
    fail_after: Option<usize>,
    scans: AtomicUsize,
    journal: Journal,
}

impl SyntheticDocuments {
    pub fn new(total: usize, journal: Journal) -> Self {
        Self {
            total,
            fail_after: None,
            scans: AtomicUsize::new(0),
            journal,
        }
    }

    /// Raise a source error after yielding `count` documents
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn stream(&self) -> DocumentStream {
        let total = self.total;
        let fail_after = self.fail_after;
        stream::iter(0..total)
            .map(move |i| match fail_after {
                Some(limit) if i == limit => Err(ScanError::upstream("cursor lost")),
                _ => Ok(json!({"_id": format!("doc-{}", i), "n": i})),
            })
            .boxed()
    }
}

#[async_trait]
impl DocumentSource for SyntheticDocuments {
    async fn scan(&self) -> Result<DocumentStream, ScanError> {
        self.journal.push("scan");
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.stream())
    }
}

/// Processor that records calls and tracks peak concurrency
#[derive(Default)]
pub struct RecordingProcessor {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    backfill_calls: AtomicUsize,
    live: Mutex<Vec<Document>>,
    reject: Vec<Value>,
    journal: Option<Journal>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Fail every document whose `_id` equals `id`
    pub fn rejecting(mut self, id: &str) -> Self {
        self.reject.push(json!(id));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn backfill_calls(&self) -> usize {
        self.backfill_calls.load(Ordering::SeqCst)
    }

    pub fn live_documents(&self) -> Vec<Document> {
        self.live.lock().clone()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn process_doc(&self, document: Document, is_backfill: bool) -> Result<(), ProcessingError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Give other dispatched calls a chance to overlap
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let rejected = document
            .get("_id")
            .map(|id| self.reject.contains(id))
            .unwrap_or(false);

        if is_backfill {
            self.backfill_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.live.lock().push(document);
        }
        if let Some(journal) = &self.journal {
            journal.push(if is_backfill { "returned:backfill" } else { "returned:live" });
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if rejected {
            return Err(ProcessingError::new("rejected by test processor"));
        }
        Ok(())
    }
}

/// Checkpoint store that records saves and can be told to fail
#[derive(Default)]
pub struct RecordingStore {
    slot: Mutex<Option<Position>>,
    saves: Mutex<Vec<Position>>,
    fail_load: bool,
    fail_save: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(position: Position) -> Self {
        Self {
            slot: Mutex::new(Some(position)),
            ..Self::default()
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn saves(&self) -> Vec<Position> {
        self.saves.lock().clone()
    }

    pub fn current(&self) -> Option<Position> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for RecordingStore {
    async fn load(&self) -> Result<Option<Position>, StorageError> {
        if self.fail_load {
            return Err(StorageError::Backend {
                backend: "test",
                message: "load refused".to_string(),
            });
        }
        Ok(self.current())
    }

    async fn save(&self, position: &Position) -> Result<(), StorageError> {
        if self.fail_save {
            return Err(StorageError::Backend {
                backend: "test",
                message: "save refused".to_string(),
            });
        }
        self.saves.lock().push(position.clone());
        *self.slot.lock() = Some(position.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Poll `check` until it holds or a second passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
