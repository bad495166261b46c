//! Portal store operations
//!
//! Admin-side mutations over the portal document: portals, resources,
//! members and deadlines. Every method validates its references before
//! touching anything, so a failed call leaves the document unchanged.

use crate::document::PortalDocument;
use crate::error::{PortalResult, ValidationError};
use crate::types::{NewResource, Portal, PortalId, Resource, ResourceId, ResourceUpdate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What happens to a deleted portal's activity log history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Remove the portal's records from the log
    #[default]
    Cascade,
    /// Keep the records; they reference a portal that no longer exists
    Orphan,
}

/// Result of a portal deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPortal {
    /// The removed portal with its resources and members
    pub portal: Portal,
    /// Log records removed along with it
    pub removed_records: usize,
}

impl PortalDocument {
    /// Create a new empty portal
    ///
    /// # Errors
    /// - `ValidationError::Blank` for an empty name
    /// - `ValidationError::DuplicatePortal` if a portal with the same name
    ///   (ignoring case) exists
    pub fn create_portal(&mut self, name: &str, now: DateTime<Utc>) -> PortalResult<PortalId> {
        let id = PortalId::new(name)?;
        if self.portals.keys().any(|existing| existing.same_name(&id)) {
            return Err(ValidationError::DuplicatePortal(id.to_string()).into());
        }
        self.portals.insert(id.clone(), Portal::new(id.clone(), now));
        tracing::debug!("created portal {}", id);
        Ok(id)
    }

    /// Remove a portal with its resources and members
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` if absent
    pub fn delete_portal(
        &mut self,
        id: &PortalId,
        policy: DeletionPolicy,
    ) -> PortalResult<DeletedPortal> {
        let portal = self
            .portals
            .shift_remove(id)
            .ok_or_else(|| ValidationError::UnknownPortal(id.to_string()))?;

        let removed_records = match policy {
            DeletionPolicy::Cascade => {
                let before = self.log.len();
                self.log.retain(|r| !portal.owns(r));
                before - self.log.len()
            }
            DeletionPolicy::Orphan => 0,
        };

        tracing::debug!(
            "deleted portal {} ({:?}, {} records removed)",
            id,
            policy,
            removed_records
        );
        Ok(DeletedPortal {
            portal,
            removed_records,
        })
    }

    /// Append a resource to a portal
    ///
    /// # Errors
    /// - `ValidationError::UnknownPortal` if absent
    /// - `ValidationError::Blank` for an empty resource name
    pub fn add_resource(&mut self, portal: &PortalId, new: NewResource) -> PortalResult<ResourceId> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Blank {
                field: "resource name",
            }
            .into());
        }
        let resource = Resource {
            id: ResourceId::new(),
            name: name.to_string(),
            description: new.description,
            url: new.url,
            priority: new.priority,
            deadline: new.deadline,
            deadline_override: None,
        };
        let id = resource.id;
        self.portal_mut(portal)?.resources.push(resource);
        Ok(id)
    }

    /// Apply a partial update to a resource
    ///
    /// # Errors
    /// Unknown portal or resource, or a blank replacement name
    pub fn update_resource(
        &mut self,
        portal: &PortalId,
        resource: &ResourceId,
        update: ResourceUpdate,
    ) -> PortalResult<Resource> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ValidationError::Blank {
                    field: "resource name",
                }
                .into());
            }
        }
        let target = self.resource_mut(portal, resource)?;
        if let Some(name) = update.name {
            target.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            target.description = description;
        }
        if let Some(url) = update.url {
            target.url = url;
        }
        if let Some(priority) = update.priority {
            target.priority = priority;
        }
        if let Some(deadline) = update.deadline {
            target.deadline = deadline;
        }
        Ok(target.clone())
    }

    /// Remove a resource; its log history stays
    ///
    /// # Errors
    /// Unknown portal or resource
    pub fn remove_resource(
        &mut self,
        portal: &PortalId,
        resource: &ResourceId,
    ) -> PortalResult<Resource> {
        let entry = self.portal_mut(portal)?;
        let idx = entry
            .resources
            .iter()
            .position(|r| r.id == *resource)
            .ok_or_else(|| ValidationError::UnknownResource {
                portal: portal.to_string(),
                resource: resource.to_string(),
            })?;
        Ok(entry.resources.remove(idx))
    }

    /// Set or clear a resource's deadline override
    ///
    /// # Errors
    /// Unknown portal or resource
    pub fn set_deadline(
        &mut self,
        portal: &PortalId,
        resource: &ResourceId,
        deadline: Option<NaiveDate>,
    ) -> PortalResult<NaiveDate> {
        let target = self.resource_mut(portal, resource)?;
        target.deadline_override = deadline;
        Ok(target.effective_deadline())
    }

    /// Add one member; returns false if already present
    ///
    /// # Errors
    /// Unknown portal or blank name
    pub fn add_member(&mut self, portal: &PortalId, name: &str) -> PortalResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Blank {
                field: "member name",
            }
            .into());
        }
        let entry = self.portal_mut(portal)?;
        if entry.has_member(name) {
            return Ok(false);
        }
        entry.members.push(name.to_string());
        Ok(true)
    }

    /// Remove one member; returns false if not present
    ///
    /// The member's log history is kept.
    ///
    /// # Errors
    /// Unknown portal
    pub fn remove_member(&mut self, portal: &PortalId, name: &str) -> PortalResult<bool> {
        let entry = self.portal_mut(portal)?;
        let before = entry.members.len();
        entry.members.retain(|m| m != name.trim());
        Ok(entry.members.len() != before)
    }

    /// Replace a portal's member set with exactly the given names
    ///
    /// Names are trimmed, blanks dropped and duplicates collapsed to their
    /// first occurrence. Returns the resulting member list.
    ///
    /// # Errors
    /// Unknown portal
    pub fn sync_members<I, S>(&mut self, portal: &PortalId, names: I) -> PortalResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut members: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !members.iter().any(|m| m == name) {
                members.push(name.to_string());
            }
        }
        let entry = self.portal_mut(portal)?;
        let removed = entry
            .members
            .iter()
            .filter(|m| !members.contains(m))
            .count();
        tracing::debug!(
            "synced {} members into {} ({} removed)",
            members.len(),
            portal,
            removed
        );
        entry.members = members.clone();
        Ok(members)
    }

    fn resource_mut(
        &mut self,
        portal: &PortalId,
        resource: &ResourceId,
    ) -> PortalResult<&mut Resource> {
        let portal_name = portal.to_string();
        self.portal_mut(portal)?
            .resources
            .iter_mut()
            .find(|r| r.id == *resource)
            .ok_or_else(|| {
                ValidationError::UnknownResource {
                    portal: portal_name,
                    resource: resource.to_string(),
                }
                .into()
            })
    }
}
