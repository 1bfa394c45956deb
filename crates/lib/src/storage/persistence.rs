//! Crash-safe file replacement.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::errors::StorageError;
use crate::constants::TEMP_SUFFIX;

/// Sibling temp path used while replacing `path`, e.g. `store.json.tmp`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Replace `path` with `bytes` so that readers see either the old or the new
/// content, never a partial file.
///
/// Writes a sibling temp file, syncs it, renames it over `path`, then syncs
/// the parent directory so the rename itself is durable.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = temp_path(path);

    let mut file = fs::File::create(&tmp)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))?;

    if let Some(parent) = path.parent() {
        sync_dir(parent).await;
    }
    Ok(())
}

/// Best-effort directory fsync; not every platform supports it.
async fn sync_dir(dir: &Path) {
    let result = match fs::File::open(dir).await {
        Ok(handle) => handle.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::debug!(path = %dir.display(), error = %e, "Directory sync skipped");
    }
}

/// Read a whole file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}
