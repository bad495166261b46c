//! Error types for the portal store
//!
//! Failures fall into four families:
//! - Validation: unknown references, duplicate or blank names, protected portals
//! - Auth: bad passwords, unknown or expired sessions, missing admin rights
//! - Persistence: the backing document could not be read or written
//! - Config: the configuration file is missing, malformed or inconsistent
//!
//! Validation and auth failures are meant to be shown to the same user inline.
//! Persistence failures abort the interaction but never the process.

use std::path::PathBuf;

/// Main portal error type
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Request referenced something that does not exist or is not allowed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Caller could not be authenticated or authorized
    #[error("access denied: {0}")]
    Auth(#[from] AuthError),

    /// Backing document could not be read or written
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration rejected at load time
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export could not be produced
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// The portal service is no longer running
    #[error("portal service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl PortalError {
    /// Check if the error should be shown inline to the requesting user
    #[inline]
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Auth(_))
    }

    /// Check if the error means the caller must authenticate again
    #[inline]
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::SessionExpired { .. } | AuthError::UnknownSession(_))
        )
    }

    /// Check if the error is a lost-update conflict on save
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Persistence(PersistenceError::Conflict { .. }))
    }

    /// Create not-found error for a portal id
    #[inline]
    pub fn unknown_portal(id: impl Into<String>) -> Self {
        Self::Validation(ValidationError::UnknownPortal(id.into()))
    }
}

/// Reference and naming errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Portal id not present in the store
    #[error("portal not found: {0}")]
    UnknownPortal(String),

    /// Resource id not present in the referenced portal
    #[error("resource {resource} not found in portal {portal}")]
    UnknownResource { portal: String, resource: String },

    /// Resource id not present in any portal
    #[error("resource not found: {0}")]
    UnknownItem(String),

    /// Member name not present in the referenced portal
    #[error("member {member} not found in portal {portal}")]
    UnknownMember { portal: String, member: String },

    /// Portal name already taken (compared case-insensitively)
    #[error("portal already exists: {0}")]
    DuplicatePortal(String),

    /// A required name was empty after trimming
    #[error("{field} must not be blank")]
    Blank { field: &'static str },

    /// Portal is protected from deletion
    #[error("portal {0} is protected and cannot be removed")]
    ProtectedPortal(String),

    /// Value could not be parsed
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Authentication and session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Password did not match the stored credential
    #[error("invalid password for portal {0}")]
    BadPassword(String),

    /// Portal has no credential on record
    #[error("no credential configured for portal {0}")]
    NoCredential(String),

    /// Session id not known to this process
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// Session idle time exceeded the configured threshold
    #[error("session {session} expired after {idle_secs}s idle")]
    SessionExpired { session: String, idle_secs: i64 },

    /// Operation requires the admin portal
    #[error("admin access required")]
    AdminRequired,

    /// Member session asked about a portal other than its own
    #[error("no access to portal {0}")]
    PortalAccessDenied(String),

    /// Session has not selected a member name yet
    #[error("session has no member selected")]
    NoMemberSelected,
}

/// Document storage errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content is not a valid document
    #[error("malformed document {path}: {source}")]
    Malformed {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Document could not be encoded
    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Another writer saved since this copy was loaded
    #[error("revision conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    /// Another writer currently holds the save lock
    #[error("save lock held: {0}")]
    LockHeld(PathBuf),
}

impl PersistenceError {
    /// Wrap an i/o error with the path it occurred on
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but is inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Admin portal has no password from any source
    #[error("admin portal {0} has no password; set it in the config or environment")]
    MissingAdminPassword(String),
}

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// CSV writer failed
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    /// Output buffer could not be flushed
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the portal crates
pub type PortalResult<T> = Result<T, PortalError>;
