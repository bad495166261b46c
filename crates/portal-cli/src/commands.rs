//! Subcommand dispatch
//!
//! Each invocation starts the service, logs in once, runs one command and
//! shuts the service down again.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::ArgMatches;
use portal_core::{
    DeadlineOutlook, NewResource, NewSubmission, PortalConfig, PortalDocument, PortalId, Priority, ResourceId,
    SubmissionStatus,
};
use portal_service::{PortalService, Session};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Configuration file used when none is named
pub const DEFAULT_CONFIG_FILE: &str = "portal.toml";

/// Load configuration from `--config`, `portal.toml` or defaults, then
/// apply environment overrides
///
/// # Errors
/// A named file that cannot be read or parsed
pub fn load_config(path: Option<&Path>) -> Result<PortalConfig> {
    let config = match path {
        Some(path) => PortalConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => PortalConfig::load(DEFAULT_CONFIG_FILE)?,
        None => PortalConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Run the selected subcommand
///
/// # Errors
/// Any failure from login or the command itself
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let (name, args) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("no command given"))?;

    let config = load_config(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let service = PortalService::spawn(config).await?;

    let login = args
        .get_one::<String>("login")
        .map_or_else(|| service.admin_portal().to_string(), Clone::clone);
    let password = args
        .get_one::<String>("password")
        .ok_or_else(|| anyhow!("a password is required (--password or {})", crate::cli::LOGIN_PASSWORD_ENV))?;
    let session = match service.login(&login, password).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("login to {} failed: {}", login, e);
            service.shutdown().await;
            return Err(e.into());
        }
    };

    tracing::info!("running {} as {}", name, session.portal);
    let result = dispatch(&service, &session, name, args).await;
    if let Err(e) = &result {
        tracing::warn!("{} failed: {:#}", name, e);
    }
    service.logout(&session.id);
    service.shutdown().await;
    result
}

async fn dispatch(
    service: &PortalService,
    session: &Session,
    name: &str,
    args: &ArgMatches,
) -> Result<()> {
    let sid = &session.id;
    match name {
        "list" => {
            let doc = service.snapshot().await?;
            print_portals(&doc, session, service.admin_portal());
        }
        "create-portal" => {
            let id = service
                .create_portal(sid, required(args, "portal")?, required(args, "new-password")?)
                .await?;
            println!("Created portal {id}");
        }
        "delete-portal" => {
            let portal = portal_id(args, "portal")?;
            let deleted = service.delete_portal(sid, &portal).await?;
            println!(
                "Deleted portal {} ({} log records removed)",
                portal, deleted.removed_records
            );
        }
        "set-password" => {
            let portal = portal_id(args, "portal")?;
            service
                .set_password(sid, &portal, required(args, "new-password")?)
                .await?;
            println!("Password updated for {portal}");
        }
        "add-resource" => {
            let portal = portal_id(args, "portal")?;
            let mut resource =
                NewResource::new(required(args, "name")?, parse_date(required(args, "deadline")?)?)
                    .with_priority(required(args, "priority")?.parse::<Priority>()?);
            if let Some(description) = args.get_one::<String>("description") {
                resource = resource.with_description(description.as_str());
            }
            if let Some(url) = args.get_one::<String>("url") {
                resource = resource.with_url(url.as_str());
            }
            let id = service.add_resource(sid, &portal, resource).await?;
            println!("Added resource {id} to {portal}");
        }
        "remove-resource" => {
            let portal = portal_id(args, "portal")?;
            let item = resolve_resource(service, &portal, required(args, "resource")?).await?;
            let removed = service.remove_resource(sid, &portal, &item).await?;
            println!("Removed {} from {}", removed.name, portal);
        }
        "set-deadline" => {
            let portal = portal_id(args, "portal")?;
            let item = resolve_resource(service, &portal, required(args, "resource")?).await?;
            let deadline = if args.get_flag("clear") {
                None
            } else {
                Some(parse_date(required(args, "date")?)?)
            };
            let effective = service.set_deadline(sid, &portal, &item, deadline).await?;
            println!("Deadline is now {effective}");
        }
        "sync-members" => {
            let portal = portal_id(args, "portal")?;
            let path = args
                .get_one::<PathBuf>("file")
                .ok_or_else(|| anyhow!("missing --file"))?;
            let text = read_input(path)?;
            let members = service.sync_members_from_text(sid, &portal, &text).await?;
            println!("{} now has {} members", portal, members.len());
        }
        "submit" => {
            let portal = portal_or_login(args, session)?;
            let item = resolve_resource(service, &portal, required(args, "resource")?).await?;
            let status: SubmissionStatus = required(args, "status")?.parse()?;
            let member = required(args, "member")?;
            let notes = required(args, "notes")?;
            let record = if portal == session.portal {
                service.select_member(sid, member).await?;
                service.submit(sid, &item, status, notes).await?
            } else {
                tracing::info!("submitting for {} in {} from {}", member, portal, session.portal);
                service
                    .append(sid, NewSubmission::new(portal, member, item, status).with_notes(notes))
                    .await?
            };
            println!(
                "{} marked {} as {} at {}",
                record.member, record.item_name, record.status, record.timestamp
            );
        }
        "status" => {
            let portal = portal_or_login(args, session)?;
            let item = resolve_resource(service, &portal, required(args, "resource")?).await?;
            let member = required(args, "member")?;
            let status = service.latest_status(sid, member, &item).await?;
            println!("{member}: {status}");
        }
        "recent" => {
            let portal = portal_or_login(args, session)?;
            let count = args.get_one::<usize>("count").copied();
            for record in service.recent(sid, &portal, count).await? {
                let notes = if record.notes.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", record.notes)
                };
                println!(
                    "{}  {:<16} {:<24} {}{}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.member,
                    record.item_name,
                    record.status,
                    notes
                );
            }
        }
        "stats" => {
            let portal = portal_or_login(args, session)?;
            let stats = service.completion_stats(sid, &portal).await?;
            println!("{portal}");
            println!("  Members: {}", stats.members);
            println!("  Resources: {}", stats.resources);
            println!("  Completed: {} / {}", stats.completed, stats.total);
            println!("  Completion rate: {:.1}%", stats.rate * 100.0);
        }
        "progress" => {
            let portal = portal_or_login(args, session)?;
            let progress = service
                .member_progress(sid, &portal, required(args, "member")?)
                .await?;
            println!("{} in {}", progress.member, progress.portal);
            for item in &progress.items {
                println!("  {:<24} {}", item.name, item.status);
            }
            println!(
                "  {} completed, {} in progress, {} not started",
                progress.completed, progress.in_progress, progress.not_started
            );
        }
        "export-members" => {
            let portal = args
                .get_one::<String>("portal")
                .map(PortalId::new)
                .transpose()?;
            print!("{}", service.members_csv(sid, portal.as_ref()).await?);
        }
        "backup" => {
            let json = service.backup_json(sid).await?;
            match args.get_one::<PathBuf>("output") {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("writing backup {}", path.display()))?;
                    println!("Backup written to {}", path.display());
                }
                None => print!("{json}"),
            }
        }
        other => bail!("unknown command {other}"),
    }
    Ok(())
}

fn print_portals(doc: &PortalDocument, session: &Session, admin: &PortalId) {
    let today = Utc::now().date_naive();
    for portal in doc.portals.values() {
        if !session.is_admin(admin) && portal.id != session.portal {
            continue;
        }
        println!(
            "{} ({} members, {} resources)",
            portal.id,
            portal.members.len(),
            portal.resources.len()
        );
        for resource in &portal.resources {
            println!(
                "  [{}] {:<24} {:<6} {} ({})",
                resource.id,
                resource.name,
                resource.priority,
                resource.effective_deadline(),
                DeadlineOutlook::of(resource, today)
            );
        }
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}

fn portal_id(args: &ArgMatches, name: &str) -> Result<PortalId> {
    Ok(PortalId::new(required(args, name)?)?)
}

fn portal_or_login(args: &ArgMatches, session: &Session) -> Result<PortalId> {
    match args.get_one::<String>("portal") {
        Some(name) => Ok(PortalId::new(name)?),
        None => Ok(session.portal.clone()),
    }
}

/// Parse a `YYYY-MM-DD` date
///
/// # Errors
/// Anything else
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date {text:?}, expected YYYY-MM-DD"))
}

/// Accept a resource id, or a resource name within `portal`
async fn resolve_resource(
    service: &PortalService,
    portal: &PortalId,
    text: &str,
) -> Result<ResourceId> {
    if let Ok(id) = text.parse::<ResourceId>() {
        return Ok(id);
    }
    let doc = service.snapshot().await?;
    doc.portal(portal)?
        .resource_by_name(text.trim())
        .map(|r| r.id)
        .ok_or_else(|| anyhow!("no resource named {text:?} in {portal}"))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading member list from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading member list {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(
            parse_date(" 2025-05-20 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
        );
        assert!(parse_date("20/05/2025").is_err());
    }

    #[test]
    fn named_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
