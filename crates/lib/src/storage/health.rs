//! Read-only integrity report for the store.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use super::document::Document;
use crate::constants;
use crate::schema::{self, EntityKind};

/// Category of a detected problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// The primary file failed structural checks.
    PrimaryUnreadable,
    /// The primary file is missing.
    PrimaryMissing,
    /// On-disk marker is older than the current schema version.
    StaleSchema,
    MigrationFailed,
    /// A record's key differs from its `id` field.
    IdMismatch,
    DuplicateId,
    DuplicateUsername,
    /// A record fails its entity validation.
    InvalidRecord,
    UnreadableSnapshot,
}

/// One problem found by the health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Where it was found, e.g. `projects/p1` or a snapshot file name
    pub location: String,
    pub detail: String,
}

impl Anomaly {
    pub(crate) fn new(kind: AnomalyKind, location: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            detail: detail.into(),
        }
    }
}

/// Result of [`Store::health_check`](super::Store::health_check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Marker of the primary file as stored, if it could be read
    pub schema_version: Option<u32>,
    pub current_schema_version: u32,
    pub record_counts: BTreeMap<String, usize>,
    pub backup_count: usize,
    pub primary_size_bytes: Option<u64>,
    pub anomalies: Vec<Anomaly>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn has_anomaly(&self, kind: AnomalyKind) -> bool {
        self.anomalies.iter().any(|a| a.kind == kind)
    }
}

/// Record-level checks over a migrated document.
pub(crate) fn inspect_records(document: &Document) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for (name, records) in &document.collections {
        let kind = EntityKind::for_collection(name);
        let mut seen_ids: HashMap<&str, &str> = HashMap::new();
        let mut seen_usernames: HashMap<&str, &str> = HashMap::new();

        for (key, record) in records {
            let location = format!("{name}/{key}");

            match record.get("id") {
                Some(Value::String(id)) => {
                    if id != key {
                        anomalies.push(Anomaly::new(
                            AnomalyKind::IdMismatch,
                            &location,
                            format!("record id '{id}' differs from its key"),
                        ));
                    }
                    if let Some(first) = seen_ids.insert(id.as_str(), key.as_str()) {
                        anomalies.push(Anomaly::new(
                            AnomalyKind::DuplicateId,
                            &location,
                            format!("id '{id}' is also used by {name}/{first}"),
                        ));
                    }
                }
                Some(other) => anomalies.push(Anomaly::new(
                    AnomalyKind::IdMismatch,
                    &location,
                    format!("record id {other} is not a string"),
                )),
                None => {}
            }

            if name == constants::USERS
                && let Some(username) = record.get("username").and_then(Value::as_str)
                && let Some(first) = seen_usernames.insert(username, key.as_str())
            {
                anomalies.push(Anomaly::new(
                    AnomalyKind::DuplicateUsername,
                    &location,
                    format!("username '{username}' is also used by {name}/{first}"),
                ));
            }

            if let Some(kind) = kind
                && let Err(err) = schema::validate(kind, record)
            {
                anomalies.push(Anomaly::new(
                    AnomalyKind::InvalidRecord,
                    &location,
                    err.to_string(),
                ));
            }
        }
    }

    anomalies
}
