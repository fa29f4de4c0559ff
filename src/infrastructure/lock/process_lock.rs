//! Process Lock (C3) - a reentrant, timed, cross-process advisory lock
//! keyed by a file on disk.
//!
//! Grounded on the teacher crate's registry repository, which takes an
//! OS-level exclusive advisory lock via `fs2::FileExt` before mutating
//! the shared registry file; generalised here into a standalone,
//! reentrant, timeout-bounded primitive shared by `LocalStore` and
//! `GitSyncEngine`.

use crate::domain::entities::LockRecord;
use crate::domain::ports::session_guard::SessionGuard;
use crate::error::{BackendError, BackendResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MAX_POLL_INTERVAL_MS: u64 = 100;

struct Inner {
    file: Option<File>,
    record: LockRecord,
}

/// A named advisory lock. One instance is owned exclusively by the
/// `LocalStore` whose working tree it protects (§3 Ownership).
pub struct ProcessLock {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl ProcessLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(Inner {
                file: None,
                record: LockRecord::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire per the §4.3 algorithm: reentry by the owning process is
    /// free, otherwise poll a non-blocking `flock` with bounded backoff
    /// until acquired or `timeout` elapses.
    pub fn acquire(&self, timeout: Option<Duration>) -> BackendResult<Box<dyn SessionGuard + '_>> {
        {
            let mut inner = self.inner.lock().expect("lock record mutex poisoned");
            if !inner.record.is_idle() {
                inner.record.mark_reentered();
                debug!(path = %self.path.display(), count = inner.record.reentry_count(), "process lock reentered");
                return Ok(Box::new(ProcessLockGuard { lock: self }));
            }
        }

        let start = Instant::now();
        loop {
            match self.try_lock_once()? {
                Some(file) => {
                    let mut inner = self.inner.lock().expect("lock record mutex poisoned");
                    inner.record.mark_acquired(std::process::id());
                    inner.file = Some(file);
                    debug!(path = %self.path.display(), "process lock acquired");
                    return Ok(Box::new(ProcessLockGuard { lock: self }));
                }
                None => {
                    let Some(timeout) = timeout else {
                        return Err(BackendError::lock_error(
                            "failed to acquire advisory lock",
                            Some(self.path.clone()),
                        ));
                    };
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        return Err(BackendError::LockTimeout);
                    }
                    let remaining = timeout - elapsed;
                    let interval = remaining
                        .min(Duration::from_millis(MAX_POLL_INTERVAL_MS))
                        .min(timeout / 10);
                    warn!(path = %self.path.display(), "process lock contended, retrying");
                    thread::sleep(interval.max(Duration::from_millis(1)));
                }
            }
        }
    }

    fn try_lock_once(&self) -> BackendResult<Option<File>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) {
        let mut inner = self.inner.lock().expect("lock record mutex poisoned");
        inner.record.mark_released();
        if inner.record.is_idle() {
            if let Some(file) = inner.file.take() {
                let _ = file.unlock();
            }
            debug!(path = %self.path.display(), "process lock released");
        }
    }
}

struct ProcessLockGuard<'a> {
    lock: &'a ProcessLock,
}

impl SessionGuard for ProcessLockGuard<'_> {}

impl Drop for ProcessLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
