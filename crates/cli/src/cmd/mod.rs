//! CLI command implementations

pub mod checkpoint;
pub mod config;
pub mod start;
pub mod status;
