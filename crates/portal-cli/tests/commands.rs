//! Drive the `portal` commands against a config in a temp dir

use portal_cli::{cli, run};
use portal_core::{ItemStatus, PortalDocument, PortalId, SubmissionStatus};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = r#"
session_timeout_secs = 600
admin_portal = "APH"

[[portals]]
id = "APH"
password = "admin-pw"

[[portals]]
id = "Junior"
password = "junior-pw"
members = ["Amy", "Ben"]

[[portals.resources]]
name = "Water Availability"
deadline = "2025-05-20"
priority = "high"
"#;

fn workspace() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = format!(
        "data_path = {:?}\ncredentials_path = {:?}\n{}",
        dir.path().join("portal_data.json"),
        dir.path().join("portal_credentials.json"),
        CONFIG
    );
    let path = dir.path().join("portal.toml");
    std::fs::write(&path, config).unwrap();
    (dir, path)
}

async fn portal(config: &Path, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["portal", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    let matches = cli().try_get_matches_from(argv)?;
    run(&matches).await
}

fn document(dir: &TempDir) -> PortalDocument {
    let text = std::fs::read_to_string(dir.path().join("portal_data.json")).unwrap();
    PortalDocument::from_json(&text).unwrap()
}

#[tokio::test]
async fn admin_creates_portal_and_adds_resource() {
    let (dir, config) = workspace();

    portal(&config, &["-p", "admin-pw", "create-portal", "Senior", "--new-password", "s-pw"])
        .await
        .unwrap();
    portal(
        &config,
        &[
            "-p", "admin-pw", "add-resource", "Senior", "Rigging", "--deadline", "2025-06-01",
            "--priority", "low",
        ],
    )
    .await
    .unwrap();
    portal(&config, &["-p", "admin-pw", "set-deadline", "Senior", "Rigging", "2025-06-03"])
        .await
        .unwrap();

    let doc = document(&dir);
    let senior = &doc.portals[&PortalId::new("Senior").unwrap()];
    assert_eq!(senior.resources.len(), 1);
    assert_eq!(
        senior.resources[0].effective_deadline().to_string(),
        "2025-06-03"
    );

    // The new portal's password works for member commands
    portal(&config, &["--login", "Senior", "-p", "s-pw", "stats"])
        .await
        .unwrap();
}

#[tokio::test]
async fn member_submits_by_resource_name() {
    let (dir, config) = workspace();

    portal(
        &config,
        &[
            "--login", "Junior", "-p", "junior-pw", "submit", "Water Availability", "done",
            "--member", "Amy", "--notes", "tank full",
        ],
    )
    .await
    .unwrap();

    let doc = document(&dir);
    assert_eq!(doc.log.len(), 1);
    assert_eq!(doc.log[0].status, SubmissionStatus::Completed);
    assert_eq!(
        doc.latest_status("Amy", &doc.log[0].item).unwrap(),
        ItemStatus::Completed
    );
}

#[tokio::test]
async fn admin_submits_into_another_portal() {
    let (dir, config) = workspace();

    portal(
        &config,
        &[
            "-p", "admin-pw", "submit", "Water Availability", "in-progress", "--member", "Ben",
            "--portal", "Junior",
        ],
    )
    .await
    .unwrap();

    let doc = document(&dir);
    assert_eq!(doc.log.len(), 1);
    assert_eq!(doc.log[0].portal, PortalId::new("Junior").unwrap());
    assert_eq!(doc.log[0].member, "Ben");
    assert_eq!(doc.log[0].status, SubmissionStatus::InProgress);
}

#[tokio::test]
async fn member_cannot_submit_into_another_portal() {
    let (dir, config) = workspace();
    portal(&config, &["-p", "admin-pw", "create-portal", "Senior", "--new-password", "s-pw"])
        .await
        .unwrap();
    portal(
        &config,
        &["-p", "admin-pw", "add-resource", "Senior", "Rigging", "--deadline", "2025-06-01"],
    )
    .await
    .unwrap();

    let err = portal(
        &config,
        &[
            "--login", "Junior", "-p", "junior-pw", "submit", "Rigging", "done", "--member",
            "Amy", "--portal", "Senior",
        ],
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("admin access required"));
    assert!(document(&dir).log.is_empty());
}

#[tokio::test]
async fn member_cannot_read_another_portal() {
    let (_dir, config) = workspace();
    portal(&config, &["-p", "admin-pw", "create-portal", "Senior", "--new-password", "s-pw"])
        .await
        .unwrap();

    let err = portal(&config, &["--login", "Junior", "-p", "junior-pw", "stats", "Senior"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no access to portal Senior"));
}

#[tokio::test]
async fn member_login_cannot_run_admin_commands() {
    let (dir, config) = workspace();

    let err = portal(&config, &["--login", "Junior", "-p", "junior-pw", "delete-portal", "Junior"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("admin access required"));
    assert_eq!(document(&dir).portals.len(), 2);
}

#[tokio::test]
async fn wrong_password_is_an_error() {
    let (_dir, config) = workspace();
    assert!(portal(&config, &["-p", "nope", "list"]).await.is_err());
}

#[tokio::test]
async fn backup_writes_document_without_credentials() {
    let (dir, config) = workspace();
    let out = dir.path().join("backup.json");

    portal(&config, &["-p", "admin-pw", "backup", "--output", out.to_str().unwrap()])
        .await
        .unwrap();

    let backup = std::fs::read_to_string(&out).unwrap();
    assert!(!backup.contains("admin-pw"));
    assert_eq!(PortalDocument::from_json(&backup).unwrap(), document(&dir));
}

#[tokio::test]
async fn sync_members_from_file() {
    let (dir, config) = workspace();
    let list = dir.path().join("members.txt");
    std::fs::write(&list, "Amy\n  Cy  \n\nAmy\n").unwrap();

    portal(
        &config,
        &["-p", "admin-pw", "sync-members", "Junior", "--file", list.to_str().unwrap()],
    )
    .await
    .unwrap();

    let doc = document(&dir);
    assert_eq!(doc.portals[&PortalId::new("Junior").unwrap()].members, vec!["Amy", "Cy"]);
}
