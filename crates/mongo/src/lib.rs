//! MongoDB adapters for the change-feed consumer
//!
//! This crate provides:
//! - Connection handles built from a base URI, database and extra parameters
//! - A change-stream `MutationSource` with a server-side write-back filter
//! - A collection-scan `DocumentSource` for backfill
//! - A by-id `DocGetter` for the Processor's supplementary lookups

pub mod connection;
pub mod convert;
pub mod pipeline;
pub mod scan;
pub mod stream;

pub use connection::{connection_string, MongoHandle};
pub use pipeline::change_stream_pipeline;
pub use scan::{CollectionScanSource, MongoDocGetter, DEFAULT_BATCH_SIZE};
pub use stream::ChangeStreamSource;
