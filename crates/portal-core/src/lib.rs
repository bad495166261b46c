//! Portal Core - store and activity log for team portals
//!
//! A single [`PortalDocument`] holds every portal and the whole activity
//! log. This crate owns the in-memory semantics:
//! - Portal store: portals, resources, members, deadlines
//! - Activity log: append, latest status, recent feed, completion stats
//! - Exports: member CSV and JSON backups
//! - Configuration schema with environment overrides
//!
//! Persistence and concurrency live in `portal-persist` and
//! `portal-service`.
//!
//! # Example
//!
//! ```rust
//! use chrono::{NaiveDate, Utc};
//! use portal_core::{ItemStatus, NewResource, NewSubmission, PortalDocument, SubmissionStatus};
//!
//! let mut doc = PortalDocument::new();
//! let junior = doc.create_portal("Junior", Utc::now()).unwrap();
//! let item = doc
//!     .add_resource(
//!         &junior,
//!         NewResource::new("Water Availability", NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()),
//!     )
//!     .unwrap();
//!
//! doc.append(
//!     NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed),
//!     Utc::now(),
//! )
//! .unwrap();
//! assert_eq!(doc.latest_status("Amy", &item).unwrap(), ItemStatus::Completed);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod activity;
pub mod config;
pub mod deadline;
pub mod document;
pub mod error;
pub mod export;
pub mod members;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use activity::{CompletionStats, ItemProgress, MemberProgress, DEFAULT_RECENT};
pub use config::{PortalConfig, PortalSeed};
pub use deadline::DeadlineOutlook;
pub use document::{PortalDocument, SCHEMA_VERSION};
pub use error::{
    AuthError, ConfigError, ExportError, PersistenceError, PortalError, PortalResult,
    ValidationError,
};
pub use export::{backup_json, members_csv};
pub use members::parse_member_list;
pub use store::{DeletedPortal, DeletionPolicy};
pub use types::{
    ItemStatus, NewResource, NewSubmission, Portal, PortalId, Priority, Resource, ResourceId,
    ResourceUpdate, SubmissionRecord, SubmissionStatus,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
