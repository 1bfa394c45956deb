//! Users command - lists accounts without credential fields.

use std::process::ExitCode;

use strongbox::Instance;

use super::CommandResult;
use crate::output::{OutputFormat, print_json, print_table};

fn flag(set: bool) -> String {
    if set { "yes" } else { "" }.to_string()
}

/// Run the users command
pub async fn run(instance: &Instance, format: OutputFormat) -> CommandResult {
    let users = instance.users().list_users().await?;

    match format {
        OutputFormat::Human => {
            if users.is_empty() {
                println!("No users found. Run `strongbox init` to create an administrator.");
                return Ok(ExitCode::SUCCESS);
            }
            let rows: Vec<Vec<String>> = users
                .iter()
                .map(|u| {
                    vec![
                        u.username.clone(),
                        u.display_name.clone(),
                        u.role.to_string(),
                        flag(u.is_active),
                        flag(u.is_locked),
                        flag(u.must_reset_password),
                    ]
                })
                .collect();
            print_table(&["USERNAME", "NAME", "ROLE", "ACTIVE", "LOCKED", "RESET"], &rows);
        }
        OutputFormat::Json => print_json(&users)?,
    }
    Ok(ExitCode::SUCCESS)
}
