//! Deadline classification

use crate::types::Resource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days-left threshold at or under which a resource counts as due soon
pub const DUE_SOON_DAYS: i64 = 3;

/// Where a resource stands relative to its effective deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadlineOutlook {
    /// Deadline passed this many days ago
    Overdue(i64),
    /// Due within `DUE_SOON_DAYS` days (0 means today)
    DueSoon(i64),
    /// Due later than that
    Upcoming(i64),
}

impl DeadlineOutlook {
    /// Classify a resource's effective deadline against `today`
    #[must_use]
    pub fn of(resource: &Resource, today: NaiveDate) -> Self {
        let days_left = (resource.effective_deadline() - today).num_days();
        if days_left < 0 {
            Self::Overdue(-days_left)
        } else if days_left <= DUE_SOON_DAYS {
            Self::DueSoon(days_left)
        } else {
            Self::Upcoming(days_left)
        }
    }
}

impl fmt::Display for DeadlineOutlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overdue(days) => write!(f, "overdue by {days} days"),
            Self::DueSoon(days) => write!(f, "due in {days} days"),
            Self::Upcoming(days) => write!(f, "{days} days remaining"),
        }
    }
}
