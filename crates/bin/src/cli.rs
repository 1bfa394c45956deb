//! CLI argument definitions for the Strongbox binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Strongbox store maintenance
#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(about = "Strongbox: crash-safe record store and security layer")]
#[command(version)]
pub struct Cli {
    /// Data directory holding store.json and backups/
    #[arg(short = 'D', long, global = true, env = "STRONGBOX_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON configuration file. Environment variables override its values.
    #[arg(short, long, global = true, env = "STRONGBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store if needed and bootstrap the first administrator
    Init(InitArgs),
    /// Check store integrity; exits non-zero when anomalies are found
    Health,
    /// List backup snapshots, newest first
    Backups,
    /// Migrate the store to the current schema version and persist it
    Migrate,
    /// List user accounts
    Users,
}

/// Arguments for the init command
///
/// The password is read from `STRONGBOX_ADMIN_PASSWORD` so it never shows
/// up in the process list or shell history.
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Username of the administrator
    #[arg(long, default_value = "admin")]
    pub admin: String,

    /// Display name of the administrator (defaults to the username)
    #[arg(long)]
    pub display_name: Option<String>,
}
