//! Portal credentials
//!
//! Passwords never enter the portal document. Each portal gets a random
//! salt and the SHA-256 of salt followed by password, both hex encoded,
//! kept in a separate JSON file that backups do not include.

use indexmap::IndexMap;
use portal_core::{AuthError, PersistenceError, PortalId, PortalResult, ValidationError};
use serde::{Deserialize, Serialize};
use portal_persist::SaveLock;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Salted password hash for one portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    /// Hex-encoded 16-byte salt
    pub salt: String,
    /// Hex-encoded SHA-256(salt || password)
    pub hash: String,
}

impl Credential {
    /// Derive a credential with a fresh random salt
    #[must_use]
    pub fn derive(password: &str) -> Self {
        let salt: [u8; 16] = rand::random();
        Self::with_salt(&salt, password)
    }

    fn with_salt(salt: &[u8], password: &str) -> Self {
        Self {
            salt: hex::encode(salt),
            hash: hex::encode(digest(salt, password)),
        }
    }

    /// Check a password against this credential
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.hash)) else {
            return false;
        };
        let actual = digest(&salt, password);
        expected.len() == actual.len()
            && expected
                .iter()
                .zip(actual.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Credentials by portal id
///
/// The file carries its own `revision` so two processes sharing it detect
/// each other's saves the same way the portal document does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialStore {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    portals: IndexMap<PortalId, Credential>,
}

impl CredentialStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from file; empty if it does not exist
    ///
    /// # Errors
    /// `PersistenceError` if the file is unreadable or malformed
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        Ok(portal_persist::read_json(path)?.unwrap_or_default())
    }

    /// Revision this store was loaded at or last saved as
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Overwrite the file with the next revision, whatever is on disk
    ///
    /// Callers that share the file hold its [`SaveLock`] and have checked
    /// the revision first; see [`CredentialStore::save_checked`].
    ///
    /// # Errors
    /// `PersistenceError` if encoding or writing fails; the store and the
    /// previous file are unchanged
    pub fn save(&mut self, path: &Path) -> Result<u64, PersistenceError> {
        let base = self.revision;
        self.revision = base + 1;
        if let Err(e) = self.write(path) {
            self.revision = base;
            return Err(e);
        }
        Ok(self.revision)
    }

    /// Overwrite the file only if nobody saved since this store was loaded
    ///
    /// # Errors
    /// - `PersistenceError::LockHeld` if another writer is mid-save
    /// - `PersistenceError::Conflict` if the on-disk revision moved on
    /// - `PersistenceError::Encode` / `Io` on write failure
    pub fn save_checked(&mut self, path: &Path) -> Result<u64, PersistenceError> {
        let _lock = SaveLock::acquire(path)?;
        portal_persist::ensure_revision(path, self.revision)?;
        self.save(path)
    }

    /// Write the store exactly as it is, revision included
    ///
    /// Puts back a previous state after a later step of the same commit
    /// failed. The caller still holds the lock taken for that commit.
    ///
    /// # Errors
    /// `PersistenceError` if encoding or writing fails
    pub fn restore(&self, path: &Path) -> Result<(), PersistenceError> {
        self.write(path)
    }

    fn write(&self, path: &Path) -> Result<(), PersistenceError> {
        let text = serde_json::to_string_pretty(self)?;
        portal_persist::write_atomic(path, text.as_bytes())
    }

    /// Set or replace a portal's password
    ///
    /// # Errors
    /// `ValidationError::Blank` for an empty password
    pub fn set(&mut self, portal: &PortalId, password: &str) -> PortalResult<()> {
        if password.is_empty() {
            return Err(ValidationError::Blank { field: "password" }.into());
        }
        self.portals
            .insert(portal.clone(), Credential::derive(password));
        Ok(())
    }

    /// Forget a portal's password
    pub fn remove(&mut self, portal: &PortalId) -> bool {
        self.portals.shift_remove(portal).is_some()
    }

    /// Check whether a portal has a password
    #[inline]
    #[must_use]
    pub fn contains(&self, portal: &PortalId) -> bool {
        self.portals.contains_key(portal)
    }

    /// Verify a portal's password
    ///
    /// # Errors
    /// `AuthError::NoCredential` or `AuthError::BadPassword`
    pub fn verify(&self, portal: &PortalId, password: &str) -> Result<(), AuthError> {
        let credential = self
            .portals
            .get(portal)
            .ok_or_else(|| AuthError::NoCredential(portal.to_string()))?;
        if credential.verify(password) {
            Ok(())
        } else {
            Err(AuthError::BadPassword(portal.to_string()))
        }
    }

    /// Number of portals with a password
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.portals.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junior() -> PortalId {
        PortalId::new("Junior").unwrap()
    }

    #[test]
    fn verify_accepts_only_the_password() {
        let mut store = CredentialStore::new();
        store.set(&junior(), "paddle-hard").unwrap();
        assert!(store.verify(&junior(), "paddle-hard").is_ok());
        assert_eq!(
            store.verify(&junior(), "paddle-soft"),
            Err(AuthError::BadPassword("Junior".into()))
        );
        assert_eq!(
            store.verify(&PortalId::new("Senior").unwrap(), "x"),
            Err(AuthError::NoCredential("Senior".into()))
        );
    }

    #[test]
    fn salts_differ_per_derivation() {
        let a = Credential::derive("same");
        let b = Credential::derive("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(a.verify("same") && b.verify("same"));
    }

    #[test]
    fn known_digest() {
        let c = Credential::with_salt(b"salt", "pw");
        assert_eq!(c.salt, "73616c74");
        // sha256("saltpw")
        assert_eq!(
            c.hash,
            hex::encode(Sha256::digest(b"saltpw"))
        );
    }

    #[test]
    fn stored_file_never_contains_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut store = CredentialStore::new();
        store.set(&junior(), "NTUDB#1314998").unwrap();
        store.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("NTUDB"));
        assert_eq!(CredentialStore::load(&path).unwrap(), store);
    }

    #[test]
    fn stale_store_cannot_overwrite_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut first = CredentialStore::new();
        first.set(&junior(), "junior-pw").unwrap();
        assert_eq!(first.save_checked(&path).unwrap(), 1);

        let mut stale = CredentialStore::new();
        stale.set(&PortalId::new("Senior").unwrap(), "senior-pw").unwrap();
        assert!(matches!(
            stale.save_checked(&path),
            Err(PersistenceError::Conflict { expected: 0, found: 1 })
        ));
        assert_eq!(stale.revision(), 0);

        let on_disk = CredentialStore::load(&path).unwrap();
        assert_eq!(on_disk, first);
        assert!(on_disk.verify(&junior(), "junior-pw").is_ok());
    }

    #[test]
    fn restore_keeps_the_old_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut store = CredentialStore::new();
        store.set(&junior(), "a").unwrap();
        store.save(&path).unwrap();
        let before = store.clone();

        store.set(&junior(), "b").unwrap();
        store.save(&path).unwrap();
        before.restore(&path).unwrap();

        let on_disk = CredentialStore::load(&path).unwrap();
        assert_eq!(on_disk.revision(), 1);
        assert!(on_disk.verify(&junior(), "a").is_ok());
    }

    #[test]
    fn blank_password_rejected() {
        let mut store = CredentialStore::new();
        assert!(store.set(&junior(), "").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_credential_never_verifies() {
        let c = Credential {
            salt: "zz".into(),
            hash: "00".into(),
        };
        assert!(!c.verify(""));
    }
}
