//! Backups command - lists snapshots, newest first.

use std::process::ExitCode;

use strongbox::{Instance, clock::millis_to_rfc3339};

use super::CommandResult;
use crate::output::{OutputFormat, format_bytes, print_json, print_table};

/// Run the backups command
pub async fn run(instance: &Instance, format: OutputFormat) -> CommandResult {
    let backups = instance.backups().await?;

    match format {
        OutputFormat::Human => {
            if backups.is_empty() {
                println!("No backups found.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows: Vec<Vec<String>> = backups
                .iter()
                .map(|b| {
                    vec![
                        millis_to_rfc3339(b.timestamp_millis),
                        format_bytes(b.size_bytes),
                        b.path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["CREATED", "SIZE", "FILE"], &rows);
        }
        OutputFormat::Json => print_json(&backups)?,
    }
    Ok(ExitCode::SUCCESS)
}
