//! Error taxonomy of the feed consumer
//!
//! Only [`ConnectionError`] and [`ScanError`] are fatal to a run.
//! [`StorageError`] and [`ProcessingError`] are logged and absorbed.

use thiserror::Error;

/// The upstream subscription could not be established or was lost
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open subscription on {target}: {message}")]
    Subscribe { target: String, message: String },

    #[error("subscription transport error: {0}")]
    Transport(String),

    #[error("subscription ended by the upstream")]
    Closed,

    #[error("malformed mutation event: {0}")]
    Malformed(String),
}

/// Checkpoint read or write failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("checkpoint file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} checkpoint backend: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("corrupt checkpoint: {detail}")]
    Corrupt { detail: String },
}

/// The backfill source stopped producing documents
#[derive(Debug, Error)]
#[error("backfill aborted after {processed} documents: {message}")]
pub struct ScanError {
    /// Processor calls that had returned when the scan stopped
    pub processed: u64,
    pub message: String,
}

impl ScanError {
    /// Error raised by a source before the scanner knows the count
    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            processed: 0,
            message: message.into(),
        }
    }

    pub fn with_processed(mut self, processed: u64) -> Self {
        self.processed = processed;
        self
    }
}

/// The Processor rejected a document
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
