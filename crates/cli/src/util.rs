//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use feed_core::Position;
use std::io::Write;
use std::path::PathBuf;

/// Per-user state directory (`~/.local/share/tailfeed` on Linux)
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TAILFEED_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("tailfeed"))
        .context("Could not determine state directory")
}

/// Position with its cluster time rendered as UTC
pub fn format_position(position: &Position) -> String {
    match Utc.timestamp_opt(position.seconds as i64, 0).single() {
        Some(at) => format!("{} ({})", position, at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => position.to_string(),
    }
}

/// Format a millisecond timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: i64) -> String {
    let seconds = (Utc::now().timestamp_millis() - ts_ms) / 1000;

    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else {
        format!("{} days ago", seconds / 86400)
    }
}

/// Ask a yes/no question on stderr; anything but y/yes is no
pub fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
