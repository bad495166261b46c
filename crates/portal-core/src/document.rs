//! The persisted portal document
//!
//! One JSON object holds every portal and the full activity log. It is
//! loaded whole and rewritten whole; `revision` counts successful saves so
//! writers can detect that someone else saved in between.

use crate::error::{PersistenceError, PortalError, PortalResult};
use crate::types::{Portal, PortalId, Resource, ResourceId, SubmissionRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current document schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Whole-store document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalDocument {
    /// Schema version
    pub schema: u32,
    /// Number of saves this document has been through
    pub revision: u64,
    /// Next activity log sequence number
    pub next_seq: u64,
    /// Portals by id, in creation order
    pub portals: IndexMap<PortalId, Portal>,
    /// Activity log, in insertion order
    pub log: Vec<SubmissionRecord>,
}

impl Default for PortalDocument {
    fn default() -> Self {
        Self {
            schema: SCHEMA_VERSION,
            revision: 0,
            next_seq: 1,
            portals: IndexMap::new(),
            log: Vec::new(),
        }
    }
}

impl PortalDocument {
    /// Create empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up portal
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` if absent
    pub fn portal(&self, id: &PortalId) -> PortalResult<&Portal> {
        self.portals
            .get(id)
            .ok_or_else(|| PortalError::unknown_portal(id.as_str()))
    }

    pub(crate) fn portal_mut(&mut self, id: &PortalId) -> PortalResult<&mut Portal> {
        self.portals
            .get_mut(id)
            .ok_or_else(|| PortalError::unknown_portal(id.as_str()))
    }

    /// Find the portal owning a resource
    #[must_use]
    pub fn find_resource(&self, id: &ResourceId) -> Option<(&Portal, &Resource)> {
        self.portals
            .values()
            .find_map(|p| p.resource(id).map(|r| (p, r)))
    }

    /// Portal ids in creation order
    pub fn portal_ids(&self) -> impl Iterator<Item = &PortalId> {
        self.portals.keys()
    }

    /// Encode as the pretty-printed JSON used on disk and in backups
    ///
    /// # Errors
    /// `PersistenceError::Encode` if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, PersistenceError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Decode from JSON text
    ///
    /// # Errors
    /// `serde_json::Error` if the text is not a valid document
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
