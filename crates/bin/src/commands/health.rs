//! Health check command - inspects the store without repairing it.

use std::process::ExitCode;

use strongbox::Instance;

use super::CommandResult;
use crate::output::{OutputFormat, format_bytes, print_json, print_table};

/// Run the health check command
pub async fn run(instance: &Instance, format: OutputFormat) -> CommandResult {
    let report = instance.health_check().await?;

    match format {
        OutputFormat::Human => {
            let version = report
                .schema_version
                .map_or_else(|| "unreadable".to_string(), |v| v.to_string());
            println!("Schema:   {version} (current {})", report.current_schema_version);
            if let Some(size) = report.primary_size_bytes {
                println!("Size:     {}", format_bytes(size));
            }
            println!("Backups:  {}", report.backup_count);
            for (collection, count) in &report.record_counts {
                println!("  {collection}: {count}");
            }

            if report.is_healthy() {
                println!("healthy");
            } else {
                let rows: Vec<Vec<String>> = report
                    .anomalies
                    .iter()
                    .map(|a| {
                        vec![
                            serde_json::to_value(a.kind)
                                .ok()
                                .and_then(|v| v.as_str().map(str::to_string))
                                .unwrap_or_default(),
                            a.location.clone(),
                            a.detail.clone(),
                        ]
                    })
                    .collect();
                print_table(&["KIND", "LOCATION", "DETAIL"], &rows);
                eprintln!("unhealthy: {} anomalies", report.anomalies.len());
            }
        }
        OutputFormat::Json => print_json(&report)?,
    }

    Ok(if report.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
