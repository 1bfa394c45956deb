//! Subcommand implementations.
//!
//! Each command receives an opened [`strongbox::Instance`] and returns the
//! process exit code.

pub mod backups;
pub mod health;
pub mod init;
pub mod migrate;
pub mod users;

/// Result type shared by the commands.
pub type CommandResult = Result<std::process::ExitCode, Box<dyn std::error::Error>>;
