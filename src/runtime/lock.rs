//! Lock file held for the duration of a lifecycle or restore operation.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Exclusive lock backed by a file; the file is removed on drop, so every
/// exit path of the holder releases it.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Creates the lock file, failing with [`AppError::Busy`] if another
    /// live process holds it. A lock left by a dead process is replaced.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        match Self::create(&path) {
            Err(AppError::Busy(_)) if Self::is_stale(&path) => {
                tracing::warn!(path = %path.display(), "Removing stale lock file");
                std::fs::remove_file(&path)?;
                Self::create(&path)
            }
            result => result,
        }
    }

    fn create(path: &Path) -> Result<Self, AppError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Busy(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "Lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// True when the recorded holder is no longer running. Unreadable or
    /// empty lock files count as held.
    fn is_stale(path: &Path) -> bool {
        let Ok(content) = std::fs::read_to_string(path) else {
            return false;
        };
        match content.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => !process_alive(pid),
            _ => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // Signal 0 only checks existence; EPERM still means a live process.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Lock released"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Could not remove lock file"),
        }
    }
}
