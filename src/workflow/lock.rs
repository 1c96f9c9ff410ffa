//! Cross-process locks for request documents
//!
//! A [`RequestLock`] holds an OS-level exclusive lock on a `.lock` file next to
//! the documents it guards. Every read-modify-write of a request document runs
//! under the lock for that request, and ID allocation runs under the store-wide
//! lock. The lock is released when the guard is dropped or the process exits,
//! so a crashed writer never leaves a stale lock behind.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::workflow::store::StoreError;

/// How long a writer waits for another process to finish
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct RequestLock {
    path: PathBuf,
    file: Option<File>,
}

impl RequestLock {
    /// Block until the lock at `path` is held or `timeout` expires
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "lock acquired");
                    return Ok(Self {
                        path,
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout { path });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RequestLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
