//! Schema migrations for the store document.
//!
//! Each step is a pure function over the collections object, tagged with the
//! version it produces. Steps run in strictly increasing order starting after
//! the document's marker. Every step is idempotent, so applying it to data
//! that already has its shape changes nothing.
//!
//! ## Adding a New Migration
//!
//! 1. Write a `fn(Value) -> Result<Value, MigrationError>` step
//! 2. Append it to [`MIGRATIONS`] with the next version number
//! 3. `CURRENT_SCHEMA_VERSION` follows the last entry

use argon2::password_hash::PasswordHash;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};

use super::errors::MigrationError;
use crate::constants;

/// A single upgrade step.
pub struct Migration {
    /// Version the document has after this step.
    pub version: u32,
    pub name: &'static str,
    pub apply: fn(Value) -> Result<Value, MigrationError>,
}

/// All known steps, ordered by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "collections_as_maps",
        apply: collections_as_maps,
    },
    Migration {
        version: 2,
        name: "user_security_fields",
        apply: user_security_fields,
    },
    Migration {
        version: 3,
        name: "project_task_defaults",
        apply: project_task_defaults,
    },
];

/// Current schema version: the version produced by the last migration.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Apply every step newer than `from`, returning the upgraded collections.
pub fn migrate(from: u32, mut collections: Value) -> Result<Value, MigrationError> {
    if from > CURRENT_SCHEMA_VERSION {
        return Err(MigrationError::UnsupportedVersion {
            found: from,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > from) {
        tracing::info!(
            from,
            to = step.version,
            step = step.name,
            "Applying schema migration"
        );
        collections = (step.apply)(collections)?;
    }

    Ok(collections)
}

fn step_failed(version: u32, name: &'static str, reason: impl Into<String>) -> MigrationError {
    MigrationError::StepFailed {
        version,
        name,
        reason: reason.into(),
    }
}

fn into_object(value: Value, version: u32, name: &'static str) -> Result<Map<String, Value>, MigrationError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(step_failed(version, name, "collections is not an object")),
    }
}

/// Id stored on a record, as a string key.
fn record_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deterministic id for a record that has none.
fn derived_id(scope: &str, index: usize, record: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(scope.as_bytes());
    hasher.update(&index.to_le_bytes());
    hasher.update(record.to_string().as_bytes());
    hasher.finalize().to_hex()[..32].to_string()
}

/// Step 1: list-shaped collections become id-keyed maps and every record
/// carries its key as `id`.
fn collections_as_maps(collections: Value) -> Result<Value, MigrationError> {
    const VERSION: u32 = 1;
    const NAME: &str = "collections_as_maps";

    let collections = into_object(collections, VERSION, NAME)?;
    let mut out = Map::new();

    for (name, collection) in collections {
        let mut records = Map::new();
        match collection {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    let Value::Object(mut record) = item else {
                        return Err(step_failed(
                            VERSION,
                            NAME,
                            format!("{name}[{index}] is not an object"),
                        ));
                    };
                    let mut id = record_id(&record)
                        .or_else(|| {
                            (name == constants::USERS)
                                .then(|| record.get("username").and_then(Value::as_str))
                                .flatten()
                                .map(str::to_string)
                        })
                        .unwrap_or_else(|| {
                            derived_id(&name, index, &Value::Object(record.clone()))
                        });
                    // Later duplicates keep their data under a fresh key.
                    if records.contains_key(&id) {
                        let rekeyed = derived_id(&name, index, &Value::Object(record.clone()));
                        tracing::warn!(
                            collection = %name,
                            id = %id,
                            new_id = %rekeyed,
                            "Duplicate legacy record id, re-keying"
                        );
                        id = rekeyed;
                    }
                    record.insert("id".to_string(), Value::String(id.clone()));
                    records.insert(id, Value::Object(record));
                }
            }
            Value::Object(existing) => {
                for (key, value) in existing {
                    let Value::Object(mut record) = value else {
                        return Err(step_failed(
                            VERSION,
                            NAME,
                            format!("{name}/{key} is not an object"),
                        ));
                    };
                    if record_id(&record).is_none() {
                        record.insert("id".to_string(), Value::String(key.clone()));
                    }
                    records.insert(key, Value::Object(record));
                }
            }
            _ => {
                return Err(step_failed(
                    VERSION,
                    NAME,
                    format!("collection '{name}' is neither a list nor a map"),
                ));
            }
        }
        out.insert(name, Value::Object(records));
    }

    Ok(Value::Object(out))
}

fn normalize_role(role: Option<&Value>) -> &'static str {
    let role = role.and_then(Value::as_str).unwrap_or_default();
    ["Admin", "Manager", "User", "Viewer"]
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(role.trim()))
        .unwrap_or("Viewer")
}

/// Whether a stored hash is an argon2 PHC string this crate can verify.
fn is_argon2_hash(hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| parsed.algorithm.as_str().starts_with("argon2"))
}

/// Milliseconds since the epoch for the date formats older stores wrote.
fn legacy_timestamp_millis(text: &str) -> Option<u64> {
    let text = text.trim();
    let datetime = chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    u64::try_from(datetime.and_utc().timestamp_millis()).ok()
}

/// Rewrite a timestamp field as epoch milliseconds, dropping what cannot be parsed.
fn normalize_timestamp(user: &mut Map<String, Value>, field: &str) {
    let millis = match user.get(field) {
        None | Some(Value::Null) => return,
        Some(value) if value.is_u64() => return,
        Some(value) => value.as_str().and_then(legacy_timestamp_millis),
    };
    match millis {
        Some(millis) => user.insert(field.to_string(), json!(millis)),
        None => user.remove(field),
    };
}

/// Step 2: user records gain role, lockout and reset fields. Legacy
/// plaintext passwords and hashes other than argon2 are removed; those
/// accounts must have their password reset. Timestamps become epoch millis.
fn user_security_fields(collections: Value) -> Result<Value, MigrationError> {
    const VERSION: u32 = 2;
    const NAME: &str = "user_security_fields";

    let mut collections = into_object(collections, VERSION, NAME)?;
    let Some(Value::Object(users)) = collections.get_mut(constants::USERS) else {
        return Ok(Value::Object(collections));
    };

    for (id, user) in users.iter_mut() {
        let Value::Object(user) = user else {
            return Err(step_failed(VERSION, NAME, format!("users/{id} is not an object")));
        };

        let role = normalize_role(user.get("role"));
        user.insert("role".to_string(), json!(role));

        if !user.contains_key("display_name") {
            let display = user
                .remove("name")
                .filter(Value::is_string)
                .or_else(|| user.get("username").cloned())
                .unwrap_or_else(|| json!(id));
            user.insert("display_name".to_string(), display);
        }

        user.remove("password");
        let usable_hash = user
            .get("password_hash")
            .and_then(Value::as_str)
            .is_some_and(is_argon2_hash);
        if !usable_hash {
            user.remove("password_hash");
            user.remove("salt");
            user.insert("must_reset_password".to_string(), json!(true));
        }

        if user
            .get("email")
            .and_then(Value::as_str)
            .is_some_and(|email| email.trim().is_empty())
        {
            user.insert("email".to_string(), Value::Null);
        }

        normalize_timestamp(user, "created_at");
        normalize_timestamp(user, "last_success_at");
        if user.get("last_success_at").is_none_or(Value::is_null)
            && let Some(millis) = user
                .get("last_login")
                .and_then(Value::as_str)
                .and_then(legacy_timestamp_millis)
        {
            user.insert("last_success_at".to_string(), json!(millis));
        }

        for (field, default) in [
            ("is_active", json!(true)),
            ("lockout", json!({"state": "active"})),
            ("recent_failures", json!([])),
            ("last_success_at", Value::Null),
            ("must_reset_password", json!(false)),
        ] {
            user.entry(field).or_insert(default);
        }
    }

    Ok(Value::Object(collections))
}

const PROJECT_LIST_FIELDS: &[&str] = &[
    "tasks",
    "tags",
    "images",
    "risks",
    "team",
    "activity_log",
    "documents",
    "decisions",
    "milestones",
    "time_logs",
    "wiki_pages",
];

fn fill_task_defaults(task: &mut Map<String, Value>) {
    if !task.contains_key("status") {
        let done = task.get("done").and_then(Value::as_bool).unwrap_or(false);
        task.insert(
            "status".to_string(),
            json!(if done { "Done" } else { "To Do" }),
        );
    }
    task.entry("comments").or_insert_with(|| json!([]));
    task.entry("assignee").or_insert(Value::Null);
}

/// Step 3: project and task records get the list, budget and status fields
/// business modules rely on.
fn project_task_defaults(collections: Value) -> Result<Value, MigrationError> {
    const VERSION: u32 = 3;
    const NAME: &str = "project_task_defaults";

    let mut collections = into_object(collections, VERSION, NAME)?;

    if let Some(Value::Object(projects)) = collections.get_mut(constants::PROJECTS) {
        for (project_id, project) in projects.iter_mut() {
            let Value::Object(project) = project else {
                return Err(step_failed(
                    VERSION,
                    NAME,
                    format!("projects/{project_id} is not an object"),
                ));
            };
            for field in PROJECT_LIST_FIELDS {
                project.entry(*field).or_insert_with(|| json!([]));
            }
            project
                .entry("budget")
                .or_insert_with(|| json!({"total": 0.0, "currency": "EUR", "expenses": []}));

            if let Some(Value::Array(tasks)) = project.get_mut("tasks") {
                for (index, task) in tasks.iter_mut().enumerate() {
                    if let Value::Object(task) = task {
                        if record_id(task).is_none() {
                            let id = derived_id(project_id, index, &Value::Object(task.clone()));
                            task.insert("id".to_string(), json!(id));
                        }
                        fill_task_defaults(task);
                    }
                }
            }
        }
    }

    if let Some(Value::Object(tasks)) = collections.get_mut(constants::TASKS) {
        for task in tasks.values_mut() {
            if let Value::Object(task) = task {
                fill_task_defaults(task);
            }
        }
    }

    Ok(Value::Object(collections))
}
