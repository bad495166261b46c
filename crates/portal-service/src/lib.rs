//! Portal Service - single-writer access to the portal document
//!
//! Wraps the document from `portal-core` and the file backend from
//! `portal-persist` in one actor task, so in-process writers never race.
//! Across processes, saves are revision-checked and a stale writer gets a
//! conflict error instead of silently overwriting newer data.
//!
//! Also provides the access gate:
//! - [`CredentialStore`]: salted password hashes in a separate file
//! - [`SessionManager`]: in-memory sessions with an idle timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use portal_core::PortalConfig;
//! use portal_service::PortalService;
//!
//! # async fn example() -> portal_core::PortalResult<()> {
//! let config = PortalConfig::load("portal.toml")?.with_env_overrides();
//! let service = PortalService::spawn(config).await?;
//! let admin = service.login("Admin", "secret").await?;
//! let junior = service.create_portal(&admin.id, "Junior", "junior-pw").await?;
//! println!("created {junior}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

mod actor;
pub mod credentials;
pub mod service;
pub mod session;

pub use credentials::{Credential, CredentialStore};
pub use service::PortalService;
pub use session::{Session, SessionId, SessionManager};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
