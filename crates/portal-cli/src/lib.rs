//! Portal CLI - command-line front end for the portal service
//!
//! The binary is `portal`. Every command logs in first: admin commands
//! need the admin portal's password, member commands the password of the
//! member's portal (`--login <portal>`).

pub mod cli;
pub mod commands;

pub use cli::{cli, LOGIN_PASSWORD_ENV};
pub use commands::{load_config, run};
