//! Durable storage for the store document.
//!
//! A [`Store`] owns one data directory:
//!
//! ```text
//! <data_dir>/store.json                 current document
//! <data_dir>/store.json.tmp             in-flight write, ignored on load
//! <data_dir>/backups/store-backup-*.json snapshots of prior documents
//! ```
//!
//! Writes are serialized through a single async mutex and replace the primary
//! file atomically after snapshotting it. Reads take no lock; they always see
//! the last fully committed file. Loading verifies integrity, falls back to
//! the newest valid snapshot when the primary is damaged, and migrates legacy
//! documents in memory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;

use crate::Result;
use crate::audit::{AuditEventKind, AuditLog, AuditOutcome};
use crate::clock::Clock;
use crate::config::StorageConfig;
use crate::constants::{BACKUP_DIR, STORE_FILE};
use crate::schema::{self, ValidationError};

mod backup;
mod document;
pub mod errors;
mod health;
pub mod migration;
mod persistence;

pub use backup::BackupInfo;
pub use document::{Collection, Document, IntegrityFailure, RawDocument, decode};
pub use errors::{MigrationError, StorageError};
pub use health::{Anomaly, AnomalyKind, HealthReport};
pub use migration::CURRENT_SCHEMA_VERSION;

/// Actor recorded for audit entries the engine writes on its own behalf.
const SYSTEM_ACTOR: &str = "system";

/// Validate every record of a document before it is persisted.
pub fn validate_document(document: &Document) -> std::result::Result<(), ValidationError> {
    schema::validate_collections(&document.collections)
}

/// Why a decoded file could not become a current document.
enum UpgradeFailure {
    Integrity(IntegrityFailure),
    Migration(MigrationError),
}

fn upgrade(raw: RawDocument) -> std::result::Result<Document, UpgradeFailure> {
    let collections =
        migration::migrate(raw.schema_version, raw.collections).map_err(UpgradeFailure::Migration)?;
    RawDocument {
        schema_version: CURRENT_SCHEMA_VERSION,
        collections,
    }
    .into_document()
    .map_err(UpgradeFailure::Integrity)
}

/// File-backed document store with snapshots and recovery.
#[derive(Debug)]
pub struct Store {
    data_dir: PathBuf,
    store_path: PathBuf,
    backup_dir: PathBuf,
    retention: usize,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open the store in `data_dir`, creating the directory layout and an
    /// empty current-version document when nothing exists yet.
    ///
    /// An existing primary or any snapshot is left untouched, so a damaged
    /// store still goes through recovery on the first [`load`](Self::load).
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        config: &StorageConfig,
        clock: Arc<dyn Clock>,
        audit: AuditLog,
    ) -> std::result::Result<Self, StorageError> {
        let data_dir = data_dir.into();
        let backup_dir = data_dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)
            .await
            .map_err(|e| StorageError::io(&backup_dir, e))?;

        let store = Self {
            store_path: data_dir.join(STORE_FILE),
            data_dir,
            backup_dir,
            retention: config.backup_retention,
            clock,
            audit,
            write_lock: Mutex::new(()),
        };

        let primary_exists = fs::try_exists(&store.store_path)
            .await
            .map_err(|e| StorageError::io(&store.store_path, e))?;
        if !primary_exists && backup::list_backups(&store.backup_dir).await?.is_empty() {
            let bytes = document::encode(&Document::empty())?;
            persistence::write_atomic(&store.store_path, &bytes).await?;
            tracing::info!(path = %store.store_path.display(), "Initialized empty store");
        }

        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the current document.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Read, verify and migrate the current document.
    ///
    /// A primary that is missing or fails integrity checks is replaced (in
    /// memory only) by the newest valid snapshot. Both the attempt and its
    /// result are audited. Migration failures are fatal and not recovered.
    pub async fn load(&self) -> std::result::Result<Document, StorageError> {
        let reason = match persistence::read_optional(&self.store_path).await? {
            Some(bytes) => match document::decode(&bytes) {
                Ok(raw) => match upgrade(raw) {
                    Ok(document) => return Ok(document),
                    Err(UpgradeFailure::Migration(e)) => return Err(e.into()),
                    Err(UpgradeFailure::Integrity(e)) => e.reason,
                },
                Err(e) => e.reason,
            },
            None => "primary store file is missing".to_string(),
        };
        self.recover(reason).await
    }

    async fn recover(&self, reason: String) -> std::result::Result<Document, StorageError> {
        tracing::warn!(
            path = %self.store_path.display(),
            reason = %reason,
            "Primary store failed integrity check, trying backup snapshots"
        );
        self.audit.event(
            SYSTEM_ACTOR,
            AuditEventKind::IntegrityRecovery,
            AuditOutcome::Attempted,
            Some(reason.clone()),
        );

        for snapshot in backup::list_backups(&self.backup_dir).await? {
            let Some(bytes) = persistence::read_optional(&snapshot.path).await? else {
                continue;
            };
            let restored = document::decode(&bytes)
                .map_err(UpgradeFailure::Integrity)
                .and_then(upgrade);
            match restored {
                Ok(document) => {
                    let name = snapshot
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    tracing::warn!(snapshot = %name, "Recovered store from backup snapshot");
                    self.audit.event(
                        SYSTEM_ACTOR,
                        AuditEventKind::IntegrityRecovery,
                        AuditOutcome::Success,
                        Some(format!("restored from {name}")),
                    );
                    return Ok(document);
                }
                Err(UpgradeFailure::Integrity(e)) => {
                    tracing::warn!(path = %snapshot.path.display(), reason = %e, "Skipping invalid snapshot");
                }
                Err(UpgradeFailure::Migration(e)) => {
                    tracing::warn!(path = %snapshot.path.display(), error = %e, "Skipping unmigratable snapshot");
                }
            }
        }

        tracing::error!(path = %self.store_path.display(), "No valid backup snapshot found");
        self.audit.event(
            SYSTEM_ACTOR,
            AuditEventKind::IntegrityRecovery,
            AuditOutcome::Failure,
            Some("no valid backup snapshot".to_string()),
        );
        Err(StorageError::CorruptStore { reason })
    }

    /// Validate and atomically persist `document`, snapshotting the
    /// previous version first.
    pub async fn save(&self, document: &Document) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_locked(document).await
    }

    async fn save_locked(&self, document: &Document) -> Result<()> {
        if document.schema_version < CURRENT_SCHEMA_VERSION {
            return Err(StorageError::StaleSchema {
                found: document.schema_version,
                current: CURRENT_SCHEMA_VERSION,
            }
            .into());
        }
        if document.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(MigrationError::UnsupportedVersion {
                found: document.schema_version,
                supported: CURRENT_SCHEMA_VERSION,
            }
            .into());
        }
        validate_document(document)?;
        let bytes = document::encode(document)?;

        if let Some(current) = persistence::read_optional(&self.store_path).await? {
            match document::decode(&current) {
                Ok(_) => {
                    backup::create_snapshot(&self.backup_dir, &current, self.clock.now_millis())
                        .await?;
                }
                Err(e) => {
                    tracing::warn!(reason = %e, "Not snapshotting a primary that fails integrity checks");
                }
            }
        }

        persistence::write_atomic(&self.store_path, &bytes).await?;

        // The new document is committed; a failed rotation only leaves extra snapshots.
        if let Err(e) = backup::rotate(&self.backup_dir, self.retention).await {
            tracing::warn!(error = %e, "Backup rotation failed");
        }

        tracing::debug!(
            path = %self.store_path.display(),
            records = document.record_count(),
            "Saved store document"
        );
        Ok(())
    }

    /// Atomic read-modify-write.
    ///
    /// Holds the write lock across load, `f` and save. If `f` fails nothing
    /// is written; if it leaves the document unchanged no save happens.
    pub async fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let before = document.clone();
        let value = f(&mut document)?;
        if document != before {
            self.save_locked(&document).await?;
        }
        Ok(value)
    }

    /// Snapshots on disk, newest first.
    pub async fn backups(&self) -> std::result::Result<Vec<BackupInfo>, StorageError> {
        backup::list_backups(&self.backup_dir).await
    }

    /// Inspect the primary and all snapshots without changing anything.
    pub async fn health_check(&self) -> std::result::Result<HealthReport, StorageError> {
        let mut anomalies = Vec::new();
        let mut schema_version = None;
        let mut record_counts = BTreeMap::new();
        let mut primary_size_bytes = None;

        match persistence::read_optional(&self.store_path).await? {
            None => anomalies.push(Anomaly::new(
                AnomalyKind::PrimaryMissing,
                STORE_FILE,
                "primary store file is missing",
            )),
            Some(bytes) => {
                primary_size_bytes = Some(bytes.len() as u64);
                match document::decode(&bytes) {
                    Err(e) => {
                        anomalies.push(Anomaly::new(AnomalyKind::PrimaryUnreadable, STORE_FILE, e.reason))
                    }
                    Ok(raw) => {
                        schema_version = Some(raw.schema_version);
                        if raw.schema_version < CURRENT_SCHEMA_VERSION {
                            anomalies.push(Anomaly::new(
                                AnomalyKind::StaleSchema,
                                STORE_FILE,
                                format!(
                                    "stored schema version {} is older than {}",
                                    raw.schema_version, CURRENT_SCHEMA_VERSION
                                ),
                            ));
                        }
                        match upgrade(raw) {
                            Ok(document) => {
                                record_counts = document
                                    .collections
                                    .iter()
                                    .map(|(name, records)| (name.clone(), records.len()))
                                    .collect();
                                anomalies.extend(health::inspect_records(&document));
                            }
                            Err(UpgradeFailure::Migration(e)) => anomalies.push(Anomaly::new(
                                AnomalyKind::MigrationFailed,
                                STORE_FILE,
                                e.to_string(),
                            )),
                            Err(UpgradeFailure::Integrity(e)) => anomalies.push(Anomaly::new(
                                AnomalyKind::PrimaryUnreadable,
                                STORE_FILE,
                                e.reason,
                            )),
                        }
                    }
                }
            }
        }

        let backups = backup::list_backups(&self.backup_dir).await?;
        for snapshot in &backups {
            let Some(bytes) = persistence::read_optional(&snapshot.path).await? else {
                continue;
            };
            if let Err(e) = document::decode(&bytes) {
                let name = snapshot
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                anomalies.push(Anomaly::new(AnomalyKind::UnreadableSnapshot, name, e.reason));
            }
        }

        Ok(HealthReport {
            schema_version,
            current_schema_version: CURRENT_SCHEMA_VERSION,
            record_counts,
            backup_count: backups.len(),
            primary_size_bytes,
            anomalies,
        })
    }
}
