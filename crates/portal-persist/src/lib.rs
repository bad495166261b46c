//! Portal Persist - durable storage for the portal document
//!
//! The whole document lives in one JSON file that is only ever replaced
//! atomically:
//! - [`FileBackend`]: load, naive save, revision-checked save
//! - [`SaveLock`]: cross-process save lock beside the document
//! - [`write_atomic`] / [`read_json`]: helpers shared with the credential
//!   file
//! - [`ensure_revision`]: the revision check behind every checked save
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_persist::FileBackend;
//!
//! let backend = FileBackend::new("portal_data.json");
//! let mut doc = backend.load_or_default()?;
//! doc.create_portal("Junior", chrono::Utc::now())?;
//! backend.save_checked(&mut doc)?;
//! ```

#![warn(unreachable_pub)]

mod atomic;
mod backend;
mod lock;

pub use atomic::{ensure_revision, read_json, read_revision, write_atomic};
pub use backend::FileBackend;
pub use lock::{SaveLock, STALE_LOCK_AFTER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
