//! Tracing subscriber setup
//!
//! Logs go to stderr; stdout is reserved for processor output. `RUST_LOG`
//! overrides the default `info` level.

use crate::system_config::{LogFormat, LoggingConfig};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

/// Log file prefix inside `logging.directory`
pub const LOG_FILE_PREFIX: &str = "tailfeed.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// The returned guard flushes the rolling file writer on drop and must be
/// held for the life of the process.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_writer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let json = config.format == LogFormat::Json;

    let pretty_stderr = (!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));
    let json_stderr = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    // Files are always JSON lines
    let file_layer = file_writer.map(|writer| fmt::layer().json().with_ansi(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(pretty_stderr)
        .with(json_stderr)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Minimal stderr logging for short-lived commands
pub fn init_simple() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr).without_time().compact())
        .try_init();
}
