//! Cross-process save lock
//!
//! A lock is a file created with `create_new`; whoever creates it owns the
//! save. The guard removes it on drop. Locks left behind by a crashed
//! writer are broken once they are older than [`STALE_LOCK_AFTER`].

use portal_core::PersistenceError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Age after which an existing lock file is considered abandoned
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);

/// Held save lock; released on drop
#[derive(Debug)]
pub struct SaveLock {
    path: PathBuf,
}

impl SaveLock {
    /// Lock file path guarding `target`
    #[must_use]
    pub fn path_for(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquire the lock guarding `target`
    ///
    /// # Errors
    /// `PersistenceError::LockHeld` if a live lock exists,
    /// `PersistenceError::Io` for other filesystem failures
    pub fn acquire(target: &Path) -> Result<Self, PersistenceError> {
        let path = Self::path_for(target);
        match Self::create(&path) {
            Err(PersistenceError::LockHeld(_)) if Self::is_stale(&path) => {
                tracing::warn!("breaking stale save lock {}", path.display());
                let _ = std::fs::remove_file(&path);
                Self::create(&path)
            }
            other => other,
        }
    }

    /// Path of the lock file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(path: &Path) -> Result<Self, PersistenceError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(PersistenceError::LockHeld(path.to_path_buf()))
            }
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    fn is_stale(path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_LOCK_AFTER)
    }
}

impl Drop for SaveLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to release save lock {}: {}", self.path.display(), e);
        }
    }
}
