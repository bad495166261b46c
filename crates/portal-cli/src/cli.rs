//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Environment variable holding the login password
pub const LOGIN_PASSWORD_ENV: &str = "PORTAL_LOGIN_PASSWORD";

fn portal_arg() -> Arg {
    Arg::new("portal")
        .required(true)
        .help("Portal name")
}

fn optional_portal_arg() -> Arg {
    Arg::new("portal").help("Portal name (defaults to the login portal)")
}

fn resource_arg() -> Arg {
    Arg::new("resource")
        .required(true)
        .help("Resource id or name")
}

/// Build the `portal` command
#[must_use]
pub fn cli() -> Command {
    Command::new("portal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Team portal store: portals, resources, members and progress")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .env(portal_core::config::CONFIG_ENV)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("login")
                .long("login")
                .short('l')
                .global(true)
                .help("Portal to log in to (defaults to the admin portal)"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .short('p')
                .global(true)
                .env(LOGIN_PASSWORD_ENV)
                .hide_env_values(true)
                .help("Password of the login portal"),
        )
        .subcommand(Command::new("list").about("List portals with their resources and members"))
        .subcommand(
            Command::new("create-portal")
                .about("Create a portal")
                .arg(portal_arg())
                .arg(
                    Arg::new("new-password")
                        .long("new-password")
                        .required(true)
                        .help("Password for the new portal"),
                ),
        )
        .subcommand(
            Command::new("delete-portal")
                .about("Delete a portal and, by default, its history")
                .arg(portal_arg()),
        )
        .subcommand(
            Command::new("set-password")
                .about("Replace a portal's password")
                .arg(portal_arg())
                .arg(
                    Arg::new("new-password")
                        .required(true)
                        .help("New password"),
                ),
        )
        .subcommand(
            Command::new("add-resource")
                .about("Add a resource to a portal")
                .arg(portal_arg())
                .arg(Arg::new("name").required(true).help("Resource name"))
                .arg(
                    Arg::new("deadline")
                        .long("deadline")
                        .required(true)
                        .help("Deadline (YYYY-MM-DD)"),
                )
                .arg(Arg::new("description").long("description").help("Description"))
                .arg(Arg::new("url").long("url").help("Reference URL"))
                .arg(
                    Arg::new("priority")
                        .long("priority")
                        .default_value("medium")
                        .value_parser(["high", "medium", "low"])
                        .help("Priority"),
                ),
        )
        .subcommand(
            Command::new("remove-resource")
                .about("Remove a resource; its history stays in the log")
                .arg(portal_arg())
                .arg(resource_arg()),
        )
        .subcommand(
            Command::new("set-deadline")
                .about("Override a resource's deadline")
                .arg(portal_arg())
                .arg(resource_arg())
                .arg(
                    Arg::new("date")
                        .required_unless_present("clear")
                        .help("New deadline (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("clear")
                        .long("clear")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("date")
                        .help("Remove the override"),
                ),
        )
        .subcommand(
            Command::new("sync-members")
                .about("Replace a portal's members with a pasted list")
                .arg(portal_arg())
                .arg(
                    Arg::new("file")
                        .long("file")
                        .short('f')
                        .default_value("-")
                        .value_parser(value_parser!(PathBuf))
                        .help("One name per line; '-' reads stdin"),
                ),
        )
        .subcommand(
            Command::new("submit")
                .about("Record a status update for a resource")
                .arg(resource_arg())
                .arg(
                    Arg::new("status")
                        .required(true)
                        .help("completed | in-progress"),
                )
                .arg(
                    Arg::new("member")
                        .long("member")
                        .short('m')
                        .required(true)
                        .help("Member name"),
                )
                .arg(Arg::new("notes").long("notes").default_value("").help("Notes"))
                .arg(
                    Arg::new("portal")
                        .long("portal")
                        .help("Portal of the resource; other than the login portal needs admin"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Latest status of a resource for a member")
                .arg(Arg::new("member").required(true).help("Member name"))
                .arg(resource_arg())
                .arg(
                    Arg::new("portal")
                        .long("portal")
                        .help("Portal of the resource (defaults to the login portal)"),
                ),
        )
        .subcommand(
            Command::new("recent")
                .about("Most recent activity, newest first")
                .arg(optional_portal_arg())
                .arg(
                    Arg::new("count")
                        .long("count")
                        .short('n')
                        .value_parser(value_parser!(usize))
                        .help("Number of records"),
                ),
        )
        .subcommand(
            Command::new("stats")
                .about("Completion rate over members and resources")
                .arg(optional_portal_arg()),
        )
        .subcommand(
            Command::new("progress")
                .about("Per-resource status of one member")
                .arg(Arg::new("member").required(true).help("Member name"))
                .arg(optional_portal_arg()),
        )
        .subcommand(
            Command::new("export-members")
                .about("Member list as CSV")
                .arg(Arg::new("portal").help("Only this portal")),
        )
        .subcommand(
            Command::new("backup")
                .about("Full document as JSON (credentials excluded)")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write to a file instead of stdout"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn set_deadline_needs_date_or_clear() {
        assert!(cli()
            .try_get_matches_from(["portal", "set-deadline", "Junior", "Water"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["portal", "set-deadline", "Junior", "Water", "--clear"])
            .is_ok());
        assert!(cli()
            .try_get_matches_from(["portal", "set-deadline", "Junior", "Water", "2025-05-20"])
            .is_ok());
    }

    #[test]
    fn submit_takes_optional_portal() {
        let matches = cli()
            .try_get_matches_from(["portal", "submit", "Water", "done", "-m", "Amy", "--portal", "Junior"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("portal").map(String::as_str), Some("Junior"));
    }

    #[test]
    fn global_login_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["portal", "stats", "--login", "Junior", "-p", "pw"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("login").map(String::as_str), Some("Junior"));
    }
}
