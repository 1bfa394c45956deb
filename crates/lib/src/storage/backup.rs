//! Backup snapshots of the primary document.
//!
//! Snapshots are named `store-backup-<millis>.json` with the timestamp
//! zero-padded to 20 digits, so lexical and chronological order agree.
//! Timestamps are strictly increasing even when the clock stalls or steps
//! back: a new snapshot is stamped `max(now, newest + 1)`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use super::errors::StorageError;
use super::persistence::write_atomic;
use crate::constants::{BACKUP_EXTENSION, BACKUP_PREFIX};

/// A snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    /// Milliseconds since the Unix epoch encoded in the file name
    pub timestamp_millis: u64,
    pub path: PathBuf,
    pub size_bytes: u64,
}

pub(crate) fn backup_file_name(millis: u64) -> String {
    format!("{BACKUP_PREFIX}{millis:020}{BACKUP_EXTENSION}")
}

/// Timestamp of a snapshot file name, or `None` for unrelated files.
pub(crate) fn parse_backup_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// All snapshots in `dir`, newest first. A missing directory has none.
pub(crate) async fn list_backups(dir: &Path) -> Result<Vec<BackupInfo>, StorageError> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut backups = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| StorageError::io(dir, e))?
    {
        let name = entry.file_name();
        let Some(timestamp_millis) = name.to_str().and_then(parse_backup_name) else {
            continue;
        };
        // Rotation may remove a file between listing and stat.
        let size_bytes = match entry.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::io(entry.path(), e)),
        };
        backups.push(BackupInfo {
            timestamp_millis,
            path: entry.path(),
            size_bytes,
        });
    }

    backups.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));
    Ok(backups)
}

/// Write `bytes` as a new snapshot stamped no earlier than `now_millis`.
pub(crate) async fn create_snapshot(
    dir: &Path,
    bytes: &[u8],
    now_millis: u64,
) -> Result<BackupInfo, StorageError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;

    let newest = list_backups(dir).await?.first().map(|b| b.timestamp_millis);
    let timestamp_millis = match newest {
        Some(newest) => now_millis.max(newest + 1),
        None => now_millis,
    };

    let path = dir.join(backup_file_name(timestamp_millis));
    write_atomic(&path, bytes).await?;
    tracing::debug!(path = %path.display(), "Created backup snapshot");

    Ok(BackupInfo {
        timestamp_millis,
        path,
        size_bytes: bytes.len() as u64,
    })
}

/// Delete the oldest snapshots beyond `retention`. Returns how many were removed.
pub(crate) async fn rotate(dir: &Path, retention: usize) -> Result<usize, StorageError> {
    let backups = list_backups(dir).await?;
    let mut removed = 0;
    for stale in backups.iter().skip(retention) {
        match fs::remove_file(&stale.path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&stale.path, e)),
        }
    }
    if removed > 0 {
        tracing::debug!(removed, retention, "Rotated backup snapshots");
    }
    Ok(removed)
}
