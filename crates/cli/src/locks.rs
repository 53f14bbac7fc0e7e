//! Per-collection run lock
//!
//! Two consumers on the same collection would race on the checkpoint slot,
//! so `tailfeed start` holds an exclusive `flock` on
//! `<state dir>/locks/<db>.<collection>.lock` for its whole run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive lock on one collection
pub struct CollectionLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub started_at: i64,
}

/// Lock file for `namespace` under `state_dir`
pub fn lock_path(state_dir: &Path, namespace: &str) -> PathBuf {
    state_dir.join("locks").join(format!("{}.lock", namespace))
}

impl CollectionLock {
    /// Acquire the lock for `namespace` (`db.collection`).
    ///
    /// Fails if another process holds it. The kernel drops an `flock` when
    /// its holder exits, so a file left behind by a crashed run is simply
    /// locked again and its content overwritten.
    pub fn acquire(state_dir: &Path, namespace: &str) -> Result<Self> {
        let lock_path = lock_path(state_dir, namespace);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create locks directory")?;
        }

        let mut file = open_lock_file(&lock_path)?;

        if !try_flock_exclusive(&file)? {
            let holder = read_holder(&mut file)
                .map(|h| format!(" by pid {}", h.pid))
                .unwrap_or_default();
            anyhow::bail!("{} is already being consumed{}", namespace, holder);
        }

        write_holder(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Who holds the lock for `namespace`, if anyone
pub fn current_holder(state_dir: &Path, namespace: &str) -> Option<LockHolder> {
    let mut file = File::open(lock_path(state_dir, namespace)).ok()?;
    // Getting the lock means nobody holds it; closing the file releases it
    if try_flock_exclusive(&file).ok()? {
        return None;
    }
    read_holder(&mut file).ok()
}

// The file stays in place after release: unlinking it would let a new
// process lock a fresh inode while another still holds the old one.
fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .context("Failed to open lock file")
}

fn write_holder(file: &mut File) -> Result<()> {
    let holder = LockHolder {
        pid: std::process::id(),
        started_at: chrono::Utc::now().timestamp_millis(),
    };
    let serialized = serde_json::to_string(&holder).context("Failed to serialize lock content")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_holder(file: &mut File) -> Result<LockHolder> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).context("Failed to deserialize lock content")
}

#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
