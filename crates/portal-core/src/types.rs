//! Core types for the portal store
//!
//! Defines the fundamental records held in a portal document:
//! - Portal and resource identifiers
//! - Portals with their resources and members
//! - Submission records written to the activity log

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Portal identifier (the portal's name, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortalId(String);

impl PortalId {
    /// Create portal id from a name
    ///
    /// # Errors
    /// Returns `ValidationError::Blank` if the trimmed name is empty
    pub fn new(name: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Blank { field: "portal name" });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get id as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison used for duplicate detection
    #[inline]
    #[must_use]
    pub fn same_name(&self, other: &PortalId) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Environment variable that overrides this portal's password
    ///
    /// `Junior Team` maps to `PORTAL_PASSWORD_JUNIOR_TEAM`.
    #[must_use]
    pub fn password_env_var(&self) -> String {
        let suffix: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("PORTAL_PASSWORD_{suffix}")
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PortalId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Unique resource identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Ulid);

impl ResourceId {
    /// Generate new resource ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidValue {
                field: "resource id",
                value: s.to_string(),
            })
    }
}

/// Resource priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be done first
    High,
    /// Default priority
    #[default]
    Medium,
    /// Nice to have
    Low,
}

impl Priority {
    /// Lowercase name as stored in the document
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ValidationError::InvalidValue {
                field: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Status carried by a submission record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Member finished the item
    #[serde(rename = "Completed")]
    Completed,
    /// Member started the item
    #[serde(rename = "In Progress")]
    InProgress,
}

impl SubmissionStatus {
    /// Display label
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::InProgress => "In Progress",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "completed" | "done" => Ok(Self::Completed),
            "inprogress" | "started" => Ok(Self::InProgress),
            _ => Err(ValidationError::InvalidValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// Current status of a (member, item) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// No record exists for the pair
    NotStarted,
    /// Latest record says in progress
    InProgress,
    /// Latest record says completed
    Completed,
}

impl ItemStatus {
    /// Display label
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl From<SubmissionStatus> for ItemStatus {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Completed => Self::Completed,
            SubmissionStatus::InProgress => Self::InProgress,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task or resource assigned to a portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    /// Resource ID
    pub id: ResourceId,
    /// Short name shown in lists
    pub name: String,
    /// Longer description
    pub description: String,
    /// Link to the material
    pub url: String,
    /// Priority
    pub priority: Priority,
    /// Default deadline
    pub deadline: NaiveDate,
    /// Admin-set deadline that replaces the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_override: Option<NaiveDate>,
}

impl Resource {
    /// Deadline in force: the override if set, the default otherwise
    #[inline]
    #[must_use]
    pub fn effective_deadline(&self) -> NaiveDate {
        self.deadline_override.unwrap_or(self.deadline)
    }
}

/// Fields supplied when creating a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewResource {
    /// Short name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Link
    #[serde(default)]
    pub url: String,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Deadline
    pub deadline: NaiveDate,
}

impl NewResource {
    /// Create resource fields with medium priority and empty url/description
    #[must_use]
    pub fn new(name: impl Into<String>, deadline: NaiveDate) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: String::new(),
            priority: Priority::default(),
            deadline,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With url
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Partial update applied to an existing resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<NaiveDate>,
}

/// A named, password-gated workspace for one team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Portal {
    /// Portal ID
    pub id: PortalId,
    /// Name shown to users
    pub display_name: String,
    /// When the portal was created
    pub created_at: DateTime<Utc>,
    /// Ordered resources
    pub resources: Vec<Resource>,
    /// Member names (no duplicates, insertion order kept)
    pub members: Vec<String>,
    /// Fresh for every creation, so a portal re-created under a deleted
    /// one's name does not inherit its orphaned records
    #[serde(default)]
    pub incarnation: Ulid,
}

impl Portal {
    /// Create empty portal
    #[must_use]
    pub fn new(id: PortalId, created_at: DateTime<Utc>) -> Self {
        Self {
            display_name: id.as_str().to_string(),
            id,
            created_at,
            resources: Vec::new(),
            members: Vec::new(),
            incarnation: Ulid::new(),
        }
    }

    /// Check whether a log record was written against this portal
    #[inline]
    #[must_use]
    pub fn owns(&self, record: &SubmissionRecord) -> bool {
        record.portal == self.id && record.incarnation == self.incarnation
    }

    /// Find resource by id
    #[inline]
    #[must_use]
    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == *id)
    }

    /// Find first resource with the given name
    #[inline]
    #[must_use]
    pub fn resource_by_name(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

/// One immutable activity log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionRecord {
    /// Insertion sequence number, unique and increasing
    pub seq: u64,
    /// When the status change happened
    pub timestamp: DateTime<Utc>,
    /// Member name at the time of writing
    pub member: String,
    /// Portal the item belongs to
    pub portal: PortalId,
    /// Incarnation of that portal at the time of writing
    #[serde(default)]
    pub incarnation: Ulid,
    /// Item reference
    pub item: ResourceId,
    /// Item name at the time of writing
    pub item_name: String,
    /// Reported status
    pub status: SubmissionStatus,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    /// Session that produced the record
    pub session_id: String,
}

impl SubmissionRecord {
    /// Ordering key: timestamp, then insertion order
    #[inline]
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.seq)
    }
}

/// Fields supplied when appending to the activity log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub member: String,
    pub portal: PortalId,
    pub item: ResourceId,
    pub status: SubmissionStatus,
    pub notes: String,
    pub session_id: String,
    /// Explicit timestamp; assigned by the log when absent
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewSubmission {
    /// Create submission without notes, session or timestamp
    #[must_use]
    pub fn new(
        portal: PortalId,
        member: impl Into<String>,
        item: ResourceId,
        status: SubmissionStatus,
    ) -> Self {
        Self {
            member: member.into(),
            portal,
            item,
            status,
            notes: String::new(),
            session_id: String::new(),
            timestamp: None,
        }
    }

    /// With notes
    #[inline]
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// With session id
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// With explicit timestamp
    #[inline]
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
