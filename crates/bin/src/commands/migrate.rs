//! Migrate command - persists the current schema version marker.

use std::process::ExitCode;

use strongbox::Instance;
use strongbox::storage::CURRENT_SCHEMA_VERSION;

use super::CommandResult;
use crate::output::{OutputFormat, print_json};

/// Run the migrate command
pub async fn run(instance: &Instance, format: OutputFormat) -> CommandResult {
    let before = instance.health_check().await?.schema_version;

    let migrated = before != Some(CURRENT_SCHEMA_VERSION);
    if migrated {
        // Loading upgrades in memory (recovering from a snapshot if needed);
        // saving writes the upgraded document with a fresh snapshot of the old one.
        let document = instance.load_store().await?;
        instance.save_store(&document).await?;
        tracing::info!(from = ?before, to = CURRENT_SCHEMA_VERSION, "Store migrated");
    }

    match format {
        OutputFormat::Human => match (migrated, before) {
            (false, _) => println!("Already at schema version {CURRENT_SCHEMA_VERSION}"),
            (true, Some(from)) => println!("Migrated from version {from} to {CURRENT_SCHEMA_VERSION}"),
            (true, None) => println!("Restored from backup at version {CURRENT_SCHEMA_VERSION}"),
        },
        OutputFormat::Json => print_json(&serde_json::json!({
            "from": before,
            "to": CURRENT_SCHEMA_VERSION,
            "migrated": migrated,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}
