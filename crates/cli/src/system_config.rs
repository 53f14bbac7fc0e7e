//! Typed configuration for tailfeed
//!
//! Precedence: environment > TOML file > built-in defaults. The file is
//! `--config`, else `$TAILFEED_CONFIG`, else `<config dir>/tailfeed/config.toml`
//! when it exists.

use anyhow::{Context, Result};
use checkpoint::{StoreConfig, DEFAULT_CHECKPOINT_KEY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use watcher::{FeedFilter, WatcherConfig, DEFAULT_IGNORED_FIELDS};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TAILFEED_CONFIG";

/// Accepted range for `backfill.concurrency`
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub mongo: MongoConfig,
    pub backfill: BackfillConfig,
    pub checkpoint: StoreConfig,
    pub filter: FilterConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

/// Upstream database identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Base URI for the live subscription (no database path)
    pub uri: String,
    /// Base URI for the backfill scan and id lookups; `uri` when unset
    pub full_read_uri: Option<String>,
    pub db: String,
    pub collection: String,
    /// Appended to both URIs after the database name
    pub extra: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            full_read_uri: None,
            db: "orchard-mile-staging".to_string(),
            collection: "products".to_string(),
            extra: "?ssl=true".to_string(),
        }
    }
}

impl MongoConfig {
    pub fn read_uri(&self) -> &str {
        self.full_read_uri.as_deref().unwrap_or(&self.uri)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Scan the whole collection when no checkpoint is stored
    pub enabled: bool,
    /// Maximum concurrent Processor calls (1-100,000)
    pub concurrency: usize,
    /// Documents per cursor batch during the scan
    pub batch_size: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: watcher::DEFAULT_CONCURRENCY,
            batch_size: mongo::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Field paths whose changes alone never trigger processing
    pub ignore_fields: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore_fields: DEFAULT_IGNORED_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Serve the status document on this port; disabled when unset
    pub port: Option<u16>,
    pub bind: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Also write a daily-rolling log file here
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Check value ranges and required fields
    pub fn validate(&self) -> Result<()> {
        if self.mongo.db.trim().is_empty() {
            anyhow::bail!("mongo.db must not be empty");
        }
        if self.mongo.collection.trim().is_empty() {
            anyhow::bail!("mongo.collection must not be empty");
        }
        if !CONCURRENCY_RANGE.contains(&self.backfill.concurrency) {
            anyhow::bail!(
                "backfill.concurrency must be between {} and {} (got {})",
                CONCURRENCY_RANGE.start(),
                CONCURRENCY_RANGE.end(),
                self.backfill.concurrency
            );
        }
        if self.backfill.batch_size == 0 {
            anyhow::bail!("backfill.batch_size must be greater than zero");
        }
        if let StoreConfig::Redis {
            url,
            connect_timeout_ms,
            response_timeout_ms,
            ..
        } = &self.checkpoint
        {
            if url.trim().is_empty() {
                anyhow::bail!("checkpoint.url is required for the redis backend");
            }
            if *connect_timeout_ms == 0 || *response_timeout_ms == 0 {
                anyhow::bail!("checkpoint redis timeouts must be greater than zero");
            }
        }
        self.feed_filter()?;
        Ok(())
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("MONGO_URL") {
            self.mongo.uri = v;
        }
        if let Some(v) = lookup("MONGO_FULL_READ_URL") {
            self.mongo.full_read_uri = Some(v);
        }
        if let Some(v) = lookup("MONGO_DB") {
            self.mongo.db = v;
        }
        if let Some(v) = lookup("MONGO_COLLECTION") {
            self.mongo.collection = v;
        }
        if let Some(v) = lookup("MONGO_EXTRA") {
            self.mongo.extra = v;
        }
        if let Some(v) = lookup("SKIP_FULL_UPSERT") {
            self.backfill.enabled = !skip_flag(&v);
        }
        if let Some(v) = lookup("BACKFILL_CONCURRENCY") {
            self.backfill.concurrency = v
                .trim()
                .parse()
                .with_context(|| format!("BACKFILL_CONCURRENCY must be an integer (got {:?})", v))?;
        }
        if let Some(v) = lookup("STATUS_PORT") {
            let port = v
                .trim()
                .parse()
                .with_context(|| format!("STATUS_PORT must be a port number (got {:?})", v))?;
            self.status.port = Some(port);
        }

        let key_override = lookup("REDIS_KEY");
        if let Some(new_url) = lookup("REDISCLOUD_URL") {
            match &mut self.checkpoint {
                StoreConfig::Redis { url, key, .. } => {
                    *url = new_url;
                    if let Some(new_key) = key_override {
                        *key = new_key;
                    }
                }
                other => {
                    let key = key_override.unwrap_or_else(|| DEFAULT_CHECKPOINT_KEY.to_string());
                    *other = StoreConfig::redis(new_url, key);
                }
            }
        } else if let Some(new_key) = key_override {
            match &mut self.checkpoint {
                StoreConfig::Redis { key, .. } | StoreConfig::Sled { key, .. } => *key = new_key,
                _ => {}
            }
        }
        if let Some(v) = lookup("LASTOP_FILE") {
            if let StoreConfig::File { path } = &mut self.checkpoint {
                *path = PathBuf::from(v);
            }
        }

        Ok(())
    }

    pub fn feed_filter(&self) -> Result<FeedFilter> {
        FeedFilter::from_patterns(&self.filter.ignore_fields).context("Invalid filter.ignore_fields")
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            backfill_enabled: self.backfill.enabled,
            backfill_concurrency: self.backfill.concurrency,
        }
    }

    /// `db.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.mongo.db, self.mongo.collection)
    }
}

/// `SKIP_FULL_UPSERT` skips backfill unless set to false, no or 0
fn skip_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "no" | "0")
}

/// Default config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tailfeed").join("config.toml"))
}

/// The file `load` would read, if any
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_file_path().filter(|p| p.exists())
}

/// Parse a config file without applying overrides
pub fn load_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Defaults, then the resolved file, then the environment; validated
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match resolve_path(explicit) {
        Some(path) => load_file(&path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Write the example config to the default location if nothing is there
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config directory")?;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, example_config())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(path)
}

pub fn example_config() -> String {
    r#"# tailfeed configuration
# Environment variables override these values (MONGO_URL, MONGO_DB, ...).

[mongo]
uri = "mongodb://localhost:27017"
# full_read_uri = "mongodb://reader@localhost:27017"
db = "orchard-mile-staging"
collection = "products"
extra = "?ssl=true"

[backfill]
enabled = true
concurrency = 5000          # 1-100,000
batch_size = 5000           # cursor batch for the scan

[checkpoint]
backend = "file"            # file | redis | sled
path = "lastop.json"
# backend = "redis"
# url = "redis://localhost:6379"
# key = "mongoListenerLastOp"
# connect_timeout_ms = 5000
# response_timeout_ms = 2000

[filter]
ignore_fields = [
    "modifiedAt",
    "styles.$.modifiedAt",
    "styles.$.crawlerInfo.jobId",
    "styles.$.crawlerInfo.lastCrawled",
    "styles.$.variants.$.stockUpdatedAt",
]

[status]
# port = 8080
bind = "0.0.0.0"

[logging]
format = "pretty"           # pretty | json
# directory = "/var/log/tailfeed"
"#
    .to_string()
}
