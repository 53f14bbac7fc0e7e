//! tailfeed core - shared vocabulary of the change-feed consumer
//!
//! This crate provides the pieces every other crate agrees on:
//! - Mutation events and document identity
//! - Ordered feed positions (the checkpoint unit)
//! - The error taxonomy (connection, storage, scan, processing)
//! - Collaborator traits: upstream sources, the Processor, id lookups

pub mod error;
pub mod event;
pub mod position;
pub mod processor;
pub mod source;

// Re-export main types for convenience
pub use error::{ConnectionError, ProcessingError, ScanError, StorageError};
pub use event::{Document, DocumentId, MutationEvent, OperationKind};
pub use position::Position;
pub use processor::{DocGetter, Processor};
pub use source::{DocumentSource, DocumentStream, MutationSource, MutationStream};
