//! CLI command execution helpers with automatic timing
//!
//! Wraps the `tailfeed` binary in an isolated sandbox: config, state and
//! checkpoint files all live in a temporary directory, and inherited
//! configuration variables are cleared.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Variables that would leak the host's configuration into a test
const CONFIG_VARS: &[&str] = &[
    "TAILFEED_CONFIG",
    "MONGO_URL",
    "MONGO_FULL_READ_URL",
    "MONGO_DB",
    "MONGO_COLLECTION",
    "MONGO_EXTRA",
    "SKIP_FULL_UPSERT",
    "BACKFILL_CONCURRENCY",
    "REDISCLOUD_URL",
    "REDIS_KEY",
    "LASTOP_FILE",
    "STATUS_PORT",
];

/// Temporary home for one test
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create sandbox")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a config file whose checkpoint lives inside the sandbox
    pub fn write_config(&self, extra: &str) -> Result<PathBuf> {
        let path = self.path().join("tailfeed.toml");
        let lastop = self.lastop_path();
        let body = format!(
            "[checkpoint]\nbackend = \"file\"\npath = {:?}\n\n{}",
            lastop.display().to_string(),
            extra
        );
        std::fs::write(&path, body).context("Failed to write config")?;
        Ok(path)
    }

    pub fn lastop_path(&self) -> PathBuf {
        self.path().join("lastop.json")
    }

    pub fn command(&self) -> TailfeedCommand {
        let mut cmd = TailfeedCommand::new(self.path());
        let home = self.path().display().to_string();
        cmd.env("HOME", &home)
            .env("XDG_CONFIG_HOME", &format!("{}/config", home))
            .env("TAILFEED_STATE_DIR", &format!("{}/state", home))
            .env("RUST_LOG", "warn");
        cmd
    }
}

/// CLI command builder with timing
pub struct TailfeedCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin_data: Option<String>,
}

impl TailfeedCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_tailfeed")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin_data: None,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set environment variable
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Provide stdin data
    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(&self.binary_path);
        command.args(&self.args).current_dir(&self.working_dir);
        for var in CONFIG_VARS {
            command.env_remove(var);
        }
        command.envs(&self.env);

        let output = if let Some(stdin_str) = &self.stdin_data {
            let mut child = command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .context("Failed to spawn command")?;

            if let Some(mut stdin) = child.stdin.take() {
                use std::io::Write;
                stdin.write_all(stdin_str.as_bytes())?;
            }

            child.wait_with_output().context("Failed to wait for command")?
        } else {
            command.stdin(Stdio::null());
            command.output().context("Failed to execute command")?
        };

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// tailfeed!(sandbox, "checkpoint", "show").assert_success()?;
/// ```
#[macro_export]
macro_rules! tailfeed {
    ($sandbox:expr, $($arg:expr),*) => {{
        let mut cmd = $sandbox.command();
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
