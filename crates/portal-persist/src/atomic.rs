//! All-or-nothing file replacement
//!
//! Content goes to a temp file in the target's directory, is synced, then
//! renamed over the target. A failure at any step leaves the previous file
//! untouched.

use portal_core::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Replace `path` with `bytes` atomically
///
/// # Errors
/// `PersistenceError::Io` if the directory, temp file or rename fails
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| PersistenceError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PersistenceError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;
    Ok(())
}

/// Read and decode a JSON file; `None` if it does not exist
///
/// # Errors
/// `PersistenceError::Io` for read failures other than not-found,
/// `PersistenceError::Malformed` if the content does not decode
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| PersistenceError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Revision stored in a JSON file's top-level `revision` field
///
/// Other fields are ignored. A missing file or field reads as 0.
///
/// # Errors
/// As [`read_json`]
pub fn read_revision(path: &Path) -> Result<u64, PersistenceError> {
    #[derive(Deserialize)]
    struct Header {
        #[serde(default)]
        revision: u64,
    }
    Ok(read_json::<Header>(path)?.map_or(0, |h| h.revision))
}

/// Fail with `Conflict` unless the file is still at `expected`
///
/// Callers hold the file's [`SaveLock`](crate::SaveLock) so the answer
/// stays true until they write.
///
/// # Errors
/// `PersistenceError::Conflict`, or as [`read_json`]
pub fn ensure_revision(path: &Path, expected: u64) -> Result<(), PersistenceError> {
    let found = read_revision(path)?;
    if found != expected {
        tracing::warn!(
            "refusing to save {}: loaded revision {}, disk has {}",
            path.display(),
            expected,
            found
        );
        return Err(PersistenceError::Conflict { expected, found });
    }
    Ok(())
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{\"a\":2}").unwrap();

        let value: BTreeMap<String, u32> = read_json(&path).unwrap().unwrap();
        assert_eq!(value["a"], 2);
        // Only the target remains; temp files were renamed away
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<BTreeMap<String, u32>> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<BTreeMap<String, u32>>(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed { .. }));
    }

    #[test]
    fn revision_header_ignores_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        assert_eq!(read_revision(&path).unwrap(), 0);

        std::fs::write(&path, r#"{"revision": 4, "portals": {}}"#).unwrap();
        assert_eq!(read_revision(&path).unwrap(), 4);
        assert!(ensure_revision(&path, 4).is_ok());
        assert!(matches!(
            ensure_revision(&path, 3),
            Err(PersistenceError::Conflict { expected: 3, found: 4 })
        ));
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        write_atomic(&path, b"original").unwrap();

        // A directory squatting on the target makes the rename fail
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("child"), b"x").unwrap();
        assert!(write_atomic(&blocked, b"new").is_err());

        assert_eq!(std::fs::read(&path).unwrap(), b"original");
    }
}
