//! tailfeed composition root
//!
//! Configuration, logging, the run lock, the default JSON-lines processor
//! and the HTTP status surface. The `tailfeed` binary wires these to the
//! watcher and the MongoDB adapters.

pub mod locks;
pub mod logging;
pub mod processor;
pub mod status_server;
pub mod system_config;
pub mod util;
