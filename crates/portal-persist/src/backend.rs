//! File backend for the portal document
//!
//! Two save paths:
//! - [`FileBackend::save`] overwrites unconditionally. Two writers that
//!   loaded the same revision both succeed and the last one wins; the
//!   other's changes are gone.
//! - [`FileBackend::save_checked`] takes the save lock, compares the
//!   on-disk revision with the one the caller loaded, and refuses to
//!   overwrite a newer document.
//!
//! Both bump `revision` on success and leave the document untouched on
//! failure.

use crate::atomic::{ensure_revision, read_json, read_revision, write_atomic};
use crate::lock::SaveLock;
use portal_core::{PersistenceError, PortalDocument};
use std::path::{Path, PathBuf};

/// Document stored as one pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create backend for a document path
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; `None` if the file does not exist
    ///
    /// # Errors
    /// `PersistenceError::Io` or `PersistenceError::Malformed`
    pub fn load(&self) -> Result<Option<PortalDocument>, PersistenceError> {
        let doc: Option<PortalDocument> = read_json(&self.path)?;
        if let Some(doc) = &doc {
            tracing::debug!(
                "loaded {} at revision {} ({} portals, {} records)",
                self.path.display(),
                doc.revision,
                doc.portals.len(),
                doc.log.len()
            );
        }
        Ok(doc)
    }

    /// Load the document, or an empty one if the file does not exist
    ///
    /// # Errors
    /// As [`FileBackend::load`]
    pub fn load_or_default(&self) -> Result<PortalDocument, PersistenceError> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Revision currently on disk; 0 if the file does not exist
    ///
    /// # Errors
    /// As [`FileBackend::load`]
    pub fn on_disk_revision(&self) -> Result<u64, PersistenceError> {
        read_revision(&self.path)
    }

    /// Fail with `Conflict` unless the file is still at `expected`
    ///
    /// For callers that hold [`SaveLock`] themselves, e.g. to commit this
    /// document together with another file.
    ///
    /// # Errors
    /// `PersistenceError::Conflict`, or as [`FileBackend::load`]
    pub fn ensure_revision(&self, expected: u64) -> Result<(), PersistenceError> {
        ensure_revision(&self.path, expected)
    }

    /// Overwrite the file with `doc`, whatever is on disk
    ///
    /// # Errors
    /// `PersistenceError::Encode` or `PersistenceError::Io`; `doc` and the
    /// previous file are unchanged
    pub fn save(&self, doc: &mut PortalDocument) -> Result<u64, PersistenceError> {
        self.write_next_revision(doc)
    }

    /// Overwrite the file only if nobody saved since `doc` was loaded
    ///
    /// # Errors
    /// - `PersistenceError::LockHeld` if another writer is mid-save
    /// - `PersistenceError::Conflict` if the on-disk revision moved on
    /// - `PersistenceError::Encode` / `Io` on write failure
    pub fn save_checked(&self, doc: &mut PortalDocument) -> Result<u64, PersistenceError> {
        let _lock = SaveLock::acquire(&self.path)?;
        self.ensure_revision(doc.revision)?;
        self.write_next_revision(doc)
    }

    fn write_next_revision(&self, doc: &mut PortalDocument) -> Result<u64, PersistenceError> {
        let base = doc.revision;
        doc.revision = base + 1;
        let written = doc
            .to_json_pretty()
            .and_then(|text| write_atomic(&self.path, text.as_bytes()));
        match written {
            Ok(()) => {
                tracing::debug!("saved {} at revision {}", self.path.display(), doc.revision);
                Ok(doc.revision)
            }
            Err(e) => {
                doc.revision = base;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.json"));
        assert!(backend.load().unwrap().is_none());
        assert_eq!(backend.load_or_default().unwrap(), PortalDocument::new());
        assert_eq!(backend.on_disk_revision().unwrap(), 0);
    }

    #[test]
    fn save_bumps_revision() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.json"));
        let mut doc = PortalDocument::new();
        doc.create_portal("Junior", Utc::now()).unwrap();

        assert_eq!(backend.save_checked(&mut doc).unwrap(), 1);
        assert_eq!(backend.save_checked(&mut doc).unwrap(), 2);
        assert_eq!(backend.load().unwrap().unwrap(), doc);
    }

    #[test]
    fn checked_save_rejects_stale_copy() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.json"));
        let mut base = PortalDocument::new();
        backend.save_checked(&mut base).unwrap();

        let mut a = backend.load_or_default().unwrap();
        let mut b = backend.load_or_default().unwrap();
        a.create_portal("Junior", Utc::now()).unwrap();
        b.create_portal("Senior", Utc::now()).unwrap();

        backend.save_checked(&mut a).unwrap();
        let err = backend.save_checked(&mut b).unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict { expected: 1, found: 2 }));
        // Rejected copy keeps its revision so the caller can tell what it loaded
        assert_eq!(b.revision, 1);
        assert_eq!(backend.load().unwrap().unwrap(), a);
    }

    #[test]
    fn checked_save_waits_for_lock() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data.json"));
        let _held = SaveLock::acquire(backend.path()).unwrap();

        let mut doc = PortalDocument::new();
        assert!(matches!(
            backend.save_checked(&mut doc),
            Err(PersistenceError::LockHeld(_))
        ));
        assert_eq!(doc.revision, 0);
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_not_overwritten_by_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"portals\": 3}").unwrap();
        let backend = FileBackend::new(&path);
        assert!(matches!(
            backend.load(),
            Err(PersistenceError::Malformed { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"portals\": 3}");
    }
}
