//! Feed positions
//!
//! A position is the checkpoint unit: the log's own ordering coordinate
//! (a seconds/ordinal pair, as in a cluster timestamp), optionally paired with
//! the feed's native resume token. Ordering looks at the coordinate only.

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordered position in the mutation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Seconds component of the log timestamp
    pub seconds: u32,
    /// Ordinal of the operation within that second
    pub ordinal: u32,
    /// Native resume token, preferred over the timestamp when resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<serde_json::Value>,
}

impl Position {
    pub fn new(seconds: u32, ordinal: u32) -> Self {
        Self {
            seconds,
            ordinal,
            resume_token: None,
        }
    }

    pub fn with_resume_token(mut self, token: serde_json::Value) -> Self {
        self.resume_token = Some(token);
        self
    }

    /// The ordering key, seconds in the high half
    pub fn sequence(&self) -> u64 {
        ((self.seconds as u64) << 32) | self.ordinal as u64
    }

    /// Serialize for a checkpoint backend
    pub fn encode(&self) -> String {
        // A struct of integers and a JSON value cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a value written by [`Position::encode`]
    pub fn decode(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw.trim()).map_err(|e| StorageError::Corrupt {
            detail: format!("invalid position {:?}: {}", raw, e),
        })
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.sequence() == other.sequence()
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence().cmp(&other.sequence())
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.seconds, self.ordinal)
    }
}
