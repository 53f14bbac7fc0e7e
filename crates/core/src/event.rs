//! Mutation events as observed on the upstream log

use crate::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A document snapshot.
///
/// Documents are carried as JSON so that nothing downstream of the source
/// adapter depends on a particular database driver.
pub type Document = serde_json::Value;

/// Kind of mutation recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Replace,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Replace => "replace",
            OperationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a document (the `_id` value), kept in its JSON form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub serde_json::Value);

impl DocumentId {
    /// Extract the `_id` field of a document, if it has one
    pub fn of(document: &Document) -> Option<Self> {
        document.get("_id").cloned().map(Self)
    }

    /// Minimal document carrying only this id
    pub fn key_document(&self) -> Document {
        serde_json::json!({ "_id": self.0 })
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            // {"$oid": "..."} renders as the bare hex string
            serde_json::Value::Object(map) if map.len() == 1 => match map.get("$oid") {
                Some(serde_json::Value::String(oid)) => f.write_str(oid),
                _ => write!(f, "{}", self.0),
            },
            other => write!(f, "{}", other),
        }
    }
}

/// A single mutation observed on the feed
///
/// Immutable once produced by the source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    /// What happened to the document
    pub kind: OperationKind,
    /// Which document it happened to
    pub document_id: DocumentId,
    /// Current state of the document, when the source could attach one
    pub full_document: Option<Document>,
    /// Dot-delimited paths touched by the mutation (updated and removed).
    /// Empty when the source has no field-level diff.
    pub changed_fields: BTreeSet<String>,
    /// Where in the log this mutation sits
    pub position: Position,
}

impl MutationEvent {
    /// Document to hand to the Processor.
    ///
    /// Falls back to a key-only document when no snapshot is attached
    /// (deletes, or updates to documents removed before lookup).
    pub fn forward_document(&self) -> Document {
        self.full_document
            .clone()
            .unwrap_or_else(|| self.document_id.key_document())
    }
}
