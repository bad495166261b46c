//! Testing utilities for the portal workspace
//!
//! Shared fixtures: a "Junior" portal with one resource, and a temp
//! directory with a ready-to-use configuration.

#![allow(missing_docs)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use portal_core::{
    NewResource, PortalConfig, PortalDocument, PortalId, PortalSeed, Priority, ResourceId,
};
use tempfile::TempDir;

pub const ADMIN_PORTAL: &str = "APH";
pub const ADMIN_PASSWORD: &str = "admin-pw";
pub const JUNIOR_PASSWORD: &str = "junior-pw";
pub const WATER: &str = "Water Availability";

/// Fixed instant on 2025-05-01, `minute` minutes past nine
pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, minute, 0).unwrap()
}

/// Date in May 2025
pub fn may(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
}

pub fn water_availability() -> NewResource {
    NewResource::new(WATER, may(20))
        .with_description("Check water supply at the boathouse")
        .with_url("https://example.org/water")
        .with_priority(Priority::High)
}

/// Document with portal "Junior" holding one resource and no members
pub fn junior_document() -> (PortalDocument, PortalId, ResourceId) {
    let mut doc = PortalDocument::new();
    let junior = doc.create_portal("Junior", ts(0)).unwrap();
    let item = doc.add_resource(&junior, water_availability()).unwrap();
    (doc, junior, item)
}

/// Temp directory plus a config pointing into it
pub struct TestWorkspace {
    pub dir: TempDir,
    pub config: PortalConfig,
}

impl TestWorkspace {
    /// Admin portal "APH" and portal "Junior" (member Amy, one resource)
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = PortalConfig::new()
            .with_data_path(dir.path().join("portal_data.json"))
            .with_credentials_path(dir.path().join("portal_credentials.json"))
            .with_admin_portal(ADMIN_PORTAL)
            .with_seed(PortalSeed::new(ADMIN_PORTAL).with_password(ADMIN_PASSWORD))
            .with_seed(
                PortalSeed::new("Junior")
                    .with_password(JUNIOR_PASSWORD)
                    .with_members(["Amy"])
                    .with_resource(water_availability()),
            );
        Self { dir, config }
    }

    pub fn junior() -> PortalId {
        PortalId::new("Junior").unwrap()
    }

    pub fn admin() -> PortalId {
        PortalId::new(ADMIN_PORTAL).unwrap()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
