//! Two independent writers against the same document file

use portal_core::{NewSubmission, PersistenceError, PortalDocument, SubmissionStatus};
use portal_persist::{FileBackend, SaveLock};
use portal_test_utils::{junior_document, ts};
use pretty_assertions::assert_eq;

fn seeded(dir: &tempfile::TempDir) -> FileBackend {
    let backend = FileBackend::new(dir.path().join("portal_data.json"));
    let (mut doc, junior, _) = junior_document();
    doc.add_member(&junior, "Amy").unwrap();
    backend.save(&mut doc).unwrap();
    backend
}

#[test]
fn naive_save_loses_the_first_writers_update() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded(&dir);

    let mut first = backend.load().unwrap().unwrap();
    let mut second = backend.load().unwrap().unwrap();
    let junior = first.portal_ids().next().unwrap().clone();
    let item = first.portals[&junior].resources[0].id;

    first
        .append(
            NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed),
            ts(1),
        )
        .unwrap();
    second.add_member(&junior, "Ben").unwrap();

    backend.save(&mut first).unwrap();
    backend.save(&mut second).unwrap();

    // Last writer wins: Ben is there, Amy's completion is gone
    let on_disk = backend.load().unwrap().unwrap();
    assert_eq!(on_disk.portals[&junior].members, vec!["Amy", "Ben"]);
    assert!(on_disk.log.is_empty());
}

#[test]
fn checked_save_detects_the_second_writer() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded(&dir);

    let mut first = backend.load().unwrap().unwrap();
    let mut second = backend.load().unwrap().unwrap();
    let junior = first.portal_ids().next().unwrap().clone();
    let item = first.portals[&junior].resources[0].id;

    first
        .append(
            NewSubmission::new(junior.clone(), "Amy", item, SubmissionStatus::Completed),
            ts(1),
        )
        .unwrap();
    second.add_member(&junior, "Ben").unwrap();

    backend.save_checked(&mut first).unwrap();
    let err = backend.save_checked(&mut second).unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict { expected: 1, found: 2 }));

    let on_disk = backend.load().unwrap().unwrap();
    assert_eq!(on_disk.log.len(), 1);
    assert_eq!(on_disk.portals[&junior].members, vec!["Amy"]);
}

#[test]
fn held_lock_leaves_file_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded(&dir);
    let before = std::fs::read(backend.path()).unwrap();

    let _lock = SaveLock::acquire(backend.path()).unwrap();
    let mut doc = backend.load().unwrap().unwrap();
    doc.create_portal("Senior", ts(2)).unwrap();
    assert!(backend.save_checked(&mut doc).is_err());

    assert_eq!(std::fs::read(backend.path()).unwrap(), before);
    assert_eq!(doc.revision, 1);
}

#[test]
fn saved_document_round_trips_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded(&dir);

    let loaded: PortalDocument = backend.load().unwrap().unwrap();
    let text = std::fs::read_to_string(backend.path()).unwrap();
    assert_eq!(loaded.to_json_pretty().unwrap(), text);
}

proptest::proptest! {
    /// Mix writers holding the first loaded copy with writers that reload:
    /// only saves based on the current revision land
    #[test]
    fn prop_only_fresh_writers_land(stale in proptest::collection::vec(proptest::bool::ANY, 1..12)) {
        let dir = tempfile::tempdir().unwrap();
        let backend = seeded(&dir);
        let original = backend.load().unwrap().unwrap();
        let mut landed = 1u64;

        for (i, use_stale) in stale.into_iter().enumerate() {
            let mut doc = if use_stale {
                original.clone()
            } else {
                backend.load().unwrap().unwrap()
            };
            doc.create_portal(&format!("P{i}"), ts(0)).unwrap();
            let fresh = doc.revision == backend.on_disk_revision().unwrap();
            proptest::prop_assert_eq!(backend.save_checked(&mut doc).is_ok(), fresh);
            if fresh {
                landed += 1;
            }
        }
        proptest::prop_assert_eq!(backend.on_disk_revision().unwrap(), landed);
    }
}
