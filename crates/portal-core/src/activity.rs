//! Activity log operations
//!
//! Records are only ever appended. The current status of a (member, item)
//! pair is the record with the greatest `(timestamp, seq)` for that pair;
//! the same ordering drives the recent-activity feed, so a tie on timestamp
//! resolves to whichever record was inserted last.

use crate::document::PortalDocument;
use crate::error::{PortalResult, ValidationError};
use crate::types::{
    ItemStatus, NewSubmission, Portal, PortalId, ResourceId, SubmissionRecord, SubmissionStatus,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default length of the recent-activity feed
pub const DEFAULT_RECENT: usize = 10;

/// Completion figures for one portal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    /// Current member count
    pub members: usize,
    /// Current resource count
    pub resources: usize,
    /// Pairs whose latest status is Completed
    pub completed: usize,
    /// `members * resources`
    pub total: usize,
    /// `completed / total`, 0 when total is 0
    pub rate: f64,
}

/// One member's standing on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub item: ResourceId,
    pub name: String,
    pub status: ItemStatus,
}

/// One member's standing across a portal's resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProgress {
    pub portal: PortalId,
    pub member: String,
    pub items: Vec<ItemProgress>,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
}

impl PortalDocument {
    /// Append a submission record
    ///
    /// The referenced item must belong to the referenced portal. When no
    /// timestamp is supplied, `now` is used, bumped past the newest record
    /// so assigned timestamps never go backwards.
    ///
    /// # Errors
    /// - `ValidationError::UnknownPortal` / `UnknownResource`
    /// - `ValidationError::Blank` for an empty member name
    pub fn append(
        &mut self,
        submission: NewSubmission,
        now: DateTime<Utc>,
    ) -> PortalResult<SubmissionRecord> {
        let member = submission.member.trim();
        if member.is_empty() {
            return Err(ValidationError::Blank {
                field: "member name",
            }
            .into());
        }
        let portal = self.portal(&submission.portal)?;
        let item = portal.resource(&submission.item).ok_or_else(|| {
            ValidationError::UnknownResource {
                portal: submission.portal.to_string(),
                resource: submission.item.to_string(),
            }
        })?;
        let item_name = item.name.clone();
        let incarnation = portal.incarnation;

        let timestamp = match submission.timestamp {
            Some(ts) => ts,
            None => self.next_timestamp(now),
        };

        let record = SubmissionRecord {
            seq: self.next_seq,
            timestamp,
            member: member.to_string(),
            portal: submission.portal,
            incarnation,
            item: submission.item,
            item_name,
            status: submission.status,
            notes: submission.notes,
            session_id: submission.session_id,
        };
        self.next_seq += 1;
        self.log.push(record.clone());
        Ok(record)
    }

    /// Status of the most recent record for a (member, item) pair
    ///
    /// # Errors
    /// `ValidationError::UnknownItem` if no portal holds the item
    pub fn latest_status(&self, member: &str, item: &ResourceId) -> PortalResult<ItemStatus> {
        if self.find_resource(item).is_none() {
            return Err(ValidationError::UnknownItem(item.to_string()).into());
        }
        let member = member.trim();
        Ok(self
            .log
            .iter()
            .filter(|r| r.item == *item && r.member == member)
            .max_by_key(|r| r.order_key())
            .map_or(ItemStatus::NotStarted, |r| r.status.into()))
    }

    /// The `n` most recent records of a portal, newest first
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` if absent
    pub fn recent(&self, portal: &PortalId, n: usize) -> PortalResult<Vec<&SubmissionRecord>> {
        let entry = self.portal(portal)?;
        let mut records: Vec<&SubmissionRecord> =
            self.log.iter().filter(|r| entry.owns(r)).collect();
        records.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        records.truncate(n);
        Ok(records)
    }

    /// Completion figures over current members and resources
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` if absent
    pub fn completion_stats(&self, portal: &PortalId) -> PortalResult<CompletionStats> {
        let entry = self.portal(portal)?;
        let latest = self.latest_by_pair(entry);

        let completed = entry
            .members
            .iter()
            .flat_map(|m| entry.resources.iter().map(move |r| (m.as_str(), r.id)))
            .filter(|pair| {
                latest
                    .get(pair)
                    .is_some_and(|s| *s == SubmissionStatus::Completed)
            })
            .count();

        let total = entry.members.len() * entry.resources.len();
        #[allow(clippy::cast_precision_loss)]
        let rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };

        Ok(CompletionStats {
            members: entry.members.len(),
            resources: entry.resources.len(),
            completed,
            total,
            rate,
        })
    }

    /// Latest status of every current resource for one member
    ///
    /// The member does not need to be in the current member list, so
    /// historical names can still be looked up.
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` if absent
    pub fn member_progress(&self, portal: &PortalId, member: &str) -> PortalResult<MemberProgress> {
        let member = member.trim();
        let entry = self.portal(portal)?;
        let latest = self.latest_by_pair(entry);

        let items: Vec<ItemProgress> = entry
            .resources
            .iter()
            .map(|r| ItemProgress {
                item: r.id,
                name: r.name.clone(),
                status: latest
                    .get(&(member, r.id))
                    .map_or(ItemStatus::NotStarted, |s| (*s).into()),
            })
            .collect();

        let count = |status: ItemStatus| items.iter().filter(|i| i.status == status).count();
        Ok(MemberProgress {
            portal: portal.clone(),
            member: member.to_string(),
            completed: count(ItemStatus::Completed),
            in_progress: count(ItemStatus::InProgress),
            not_started: count(ItemStatus::NotStarted),
            items,
        })
    }

    fn latest_by_pair(&self, portal: &Portal) -> HashMap<(&str, ResourceId), SubmissionStatus> {
        let mut latest: HashMap<(&str, ResourceId), &SubmissionRecord> = HashMap::new();
        for record in self.log.iter().filter(|r| portal.owns(r)) {
            let key = (record.member.as_str(), record.item);
            match latest.get(&key) {
                Some(existing) if existing.order_key() > record.order_key() => {}
                _ => {
                    latest.insert(key, record);
                }
            }
        }
        latest.into_iter().map(|(k, r)| (k, r.status)).collect()
    }

    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.log.iter().map(|r| r.timestamp).max() {
            Some(newest) if now <= newest => newest + Duration::microseconds(1),
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewResource;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn t(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, min, 0).unwrap()
    }

    fn junior() -> (PortalDocument, PortalId, ResourceId) {
        let mut doc = PortalDocument::new();
        let id = doc.create_portal("Junior", t(0)).unwrap();
        let item = doc
            .add_resource(
                &id,
                NewResource::new("Water Availability", NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()),
            )
            .unwrap();
        (doc, id, item)
    }

    #[test]
    fn latest_status_follows_last_record() {
        let (mut doc, junior, item) = junior();
        doc.add_member(&junior, "Amy").unwrap();

        assert_eq!(doc.latest_status("Amy", &item).unwrap(), ItemStatus::NotStarted);

        let first = doc
            .append(
                NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed).at(t(1)),
                t(1),
            )
            .unwrap();
        let second = doc
            .append(
                NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::InProgress).at(t(2)),
                t(2),
            )
            .unwrap();

        assert_eq!(doc.latest_status("Amy", &item).unwrap(), ItemStatus::InProgress);
        let feed = doc.recent(&junior, 10).unwrap();
        assert_eq!(feed, vec![&second, &first]);
    }

    #[test]
    fn append_rejects_item_from_other_portal() {
        let (mut doc, junior, _) = junior();
        let senior = doc.create_portal("Senior", t(0)).unwrap();
        let senior_item = doc
            .add_resource(&senior, NewResource::new("Drills", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()))
            .unwrap();

        let before = doc.clone();
        let err = doc
            .append(
                NewSubmission::new(junior, "Amy", senior_item, SubmissionStatus::Completed),
                t(1),
            )
            .unwrap_err();
        assert!(err.is_user_facing());
        assert_eq!(doc, before);
    }

    #[test]
    fn append_rejects_blank_member() {
        let (mut doc, junior, item) = junior();
        assert!(doc
            .append(NewSubmission::new(junior, "  ", item, SubmissionStatus::Completed), t(1))
            .is_err());
        assert!(doc.log.is_empty());
    }

    #[test]
    fn assigned_timestamps_never_go_backwards() {
        let (mut doc, junior, item) = junior();
        let a = doc
            .append(NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::InProgress), t(5))
            .unwrap();
        // Clock stepped back
        let b = doc
            .append(NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed), t(3))
            .unwrap();
        assert!(b.timestamp > a.timestamp);
        assert_eq!(b.seq, a.seq + 1);
        assert_eq!(doc.latest_status("Amy", &item).unwrap(), ItemStatus::Completed);
    }

    #[test]
    fn recent_breaks_ties_by_insertion_order() {
        let (mut doc, junior, item) = junior();
        let mut seqs = Vec::new();
        for member in ["Amy", "Ben", "Cara"] {
            let r = doc
                .append(
                    NewSubmission::new(junior.clone(), member, item, SubmissionStatus::Completed).at(t(1)),
                    t(1),
                )
                .unwrap();
            seqs.push(r.seq);
        }
        let feed: Vec<u64> = doc.recent(&junior, 2).unwrap().iter().map(|r| r.seq).collect();
        assert_eq!(feed, vec![seqs[2], seqs[1]]);
    }

    #[test]
    fn completion_stats_counts_current_pairs() {
        let (mut doc, junior, water) = junior();
        let paddles = doc
            .add_resource(&junior, NewResource::new("Paddles", NaiveDate::from_ymd_opt(2025, 5, 9).unwrap()))
            .unwrap();
        doc.sync_members(&junior, ["Amy", "Ben"]).unwrap();

        for (member, item, status) in [
            ("Amy", water, SubmissionStatus::Completed),
            ("Amy", paddles, SubmissionStatus::InProgress),
            ("Ben", water, SubmissionStatus::Completed),
            ("Gone", paddles, SubmissionStatus::Completed),
        ] {
            doc.append(NewSubmission::new(junior.clone(), member, item, status), t(1))
                .unwrap();
        }

        let stats = doc.completion_stats(&junior).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert!((stats.rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn completion_stats_empty_portal_is_zero() {
        let mut doc = PortalDocument::new();
        let id = doc.create_portal("Empty", t(0)).unwrap();
        let stats = doc.completion_stats(&id).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.rate, 0.0);
    }

    #[test]
    fn member_progress_counts_statuses() {
        let (mut doc, junior, water) = junior();
        let paddles = doc
            .add_resource(&junior, NewResource::new("Paddles", NaiveDate::from_ymd_opt(2025, 5, 9).unwrap()))
            .unwrap();
        doc.append(NewSubmission::new(junior.clone(), "Amy", water, SubmissionStatus::Completed), t(1))
            .unwrap();

        let progress = doc.member_progress(&junior, "Amy").unwrap();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.not_started, 1);
        assert_eq!(progress.items[1].item, paddles);
        assert_eq!(progress.items[1].status, ItemStatus::NotStarted);
    }

    #[test]
    fn queries_after_delete_are_not_found() {
        let (mut doc, junior, item) = junior();
        doc.append(NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed), t(1))
            .unwrap();
        doc.delete_portal(&junior, crate::store::DeletionPolicy::Cascade)
            .unwrap();

        assert!(doc.recent(&junior, 10).is_err());
        assert!(doc.completion_stats(&junior).is_err());
        assert!(doc.member_progress(&junior, "Amy").is_err());
        assert!(doc.latest_status("Amy", &item).is_err());
    }

    #[test]
    fn member_name_is_trimmed_on_lookup() {
        let (mut doc, junior, item) = junior();
        doc.append(NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed), t(1))
            .unwrap();

        assert_eq!(doc.latest_status(" Amy ", &item).unwrap(), ItemStatus::Completed);
        let progress = doc.member_progress(&junior, "Amy\n").unwrap();
        assert_eq!(progress.member, "Amy");
        assert_eq!(progress.completed, 1);
    }

    #[test]
    fn recreated_portal_starts_without_orphaned_history() {
        let (mut doc, junior, item) = junior();
        doc.add_member(&junior, "Amy").unwrap();
        doc.append(NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed), t(1))
            .unwrap();
        doc.delete_portal(&junior, crate::store::DeletionPolicy::Orphan)
            .unwrap();

        let again = doc.create_portal("Junior", t(2)).unwrap();
        assert_eq!(again, junior);
        let water = doc
            .add_resource(&again, NewResource::new("Water Availability", NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()))
            .unwrap();
        doc.add_member(&again, "Amy").unwrap();

        assert_eq!(doc.log.len(), 1);
        assert!(doc.recent(&again, 10).unwrap().is_empty());
        assert_eq!(doc.completion_stats(&again).unwrap().completed, 0);
        assert_eq!(doc.member_progress(&again, "Amy").unwrap().not_started, 1);

        let fresh = doc
            .append(NewSubmission::new(again.clone(), "Amy", water, SubmissionStatus::InProgress), t(3))
            .unwrap();
        assert_eq!(doc.recent(&again, 10).unwrap(), vec![&fresh]);

        // Cascading the new portal leaves the older orphans alone
        let deleted = doc
            .delete_portal(&again, crate::store::DeletionPolicy::Cascade)
            .unwrap();
        assert_eq!(deleted.removed_records, 1);
        assert_eq!(doc.log.len(), 1);
    }

    fn status_strategy() -> impl Strategy<Value = SubmissionStatus> {
        prop_oneof![
            Just(SubmissionStatus::Completed),
            Just(SubmissionStatus::InProgress),
        ]
    }

    proptest! {
        #[test]
        fn prop_latest_status_is_last_append(
            ops in prop::collection::vec((0usize..3, 0usize..2, status_strategy()), 0..40)
        ) {
            let members = ["Amy", "Ben", "Cara"];
            let (mut doc, junior, water) = junior();
            let paddles = doc
                .add_resource(&junior, NewResource::new("Paddles", NaiveDate::from_ymd_opt(2025, 5, 9).unwrap()))
                .unwrap();
            let items = [water, paddles];

            let mut expected: HashMap<(usize, usize), SubmissionStatus> = HashMap::new();
            for (m, i, status) in &ops {
                doc.append(NewSubmission::new(junior.clone(), members[*m], items[*i], *status), t(1))
                    .unwrap();
                expected.insert((*m, *i), *status);
            }

            for (m, member) in members.iter().enumerate() {
                for (i, item) in items.iter().enumerate() {
                    let want = expected
                        .get(&(m, i))
                        .map_or(ItemStatus::NotStarted, |s| (*s).into());
                    prop_assert_eq!(doc.latest_status(member, item).unwrap(), want);
                }
            }
        }

        #[test]
        fn prop_completion_rate_in_unit_interval(
            member_count in 0usize..4,
            ops in prop::collection::vec((0usize..4, status_strategy()), 0..20)
        ) {
            let (mut doc, junior, item) = junior();
            let names: Vec<String> = (0..member_count).map(|i| format!("m{i}")).collect();
            doc.sync_members(&junior, &names).unwrap();
            for (m, status) in ops {
                doc.append(NewSubmission::new(junior.clone(), format!("m{m}"), item, status), t(1))
                    .unwrap();
            }
            let stats = doc.completion_stats(&junior).unwrap();
            prop_assert_eq!(stats.total, member_count);
            prop_assert!((0.0..=1.0).contains(&stats.rate));
        }
    }
}
