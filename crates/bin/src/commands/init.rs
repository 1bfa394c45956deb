//! Init command - creates the store and bootstraps the first administrator.

use std::process::ExitCode;

use strongbox::Instance;

use super::CommandResult;
use crate::cli::InitArgs;
use crate::output::{OutputFormat, print_json};

const ADMIN_PASSWORD_ENV: &str = "STRONGBOX_ADMIN_PASSWORD";

/// Run the init command
pub async fn run(instance: &Instance, args: &InitArgs, format: OutputFormat) -> CommandResult {
    let password = std::env::var(ADMIN_PASSWORD_ENV)
        .map_err(|_| format!("{ADMIN_PASSWORD_ENV} must be set to the administrator password"))?;
    let display_name = args.display_name.as_deref().unwrap_or(&args.admin);

    let admin = instance
        .users()
        .bootstrap_admin(&args.admin, display_name, &password)
        .await?;

    match format {
        OutputFormat::Human => {
            println!("Store:  {}", instance.store().store_path().display());
            println!("Admin:  {} ({})", admin.username, admin.id);
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "store": instance.store().store_path(),
            "admin": admin,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}
