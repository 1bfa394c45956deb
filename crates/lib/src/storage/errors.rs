//! Error types for the storage engine.

use std::path::PathBuf;

use thiserror::Error;

/// A schema migration step could not be applied.
///
/// Fatal for the load that triggered it; nothing is written.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// The document's marker is newer than any step this build knows.
    #[error("Document schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Marker found in the document
        found: u32,
        /// Latest version this build can produce
        supported: u32,
    },

    /// A step found data it cannot reshape.
    #[error("Migration step {version} ({name}) failed: {reason}")]
    StepFailed {
        /// Target version of the failing step
        version: u32,
        /// Step name
        name: &'static str,
        /// What was wrong with the input
        reason: String,
    },
}

/// Errors that can occur while persisting or loading the store document.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// Neither the primary document nor any snapshot passed integrity checks.
    #[error("Store is corrupt and no valid backup snapshot exists: {reason}")]
    CorruptStore {
        /// Why the primary was rejected
        reason: String,
    },

    /// Migration failed during load.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Attempt to persist a document whose marker lags the current version.
    #[error("Refusing to save schema version {found}; current version is {current}")]
    StaleSchema {
        /// Marker on the rejected document
        found: u32,
        /// Current schema version
        current: u32,
    },

    /// File I/O error.
    #[error("I/O error on {path}")]
    Io {
        /// Path the operation was working on
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    Serialization {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error means the store could not be recovered.
    pub fn is_corrupt_store(&self) -> bool {
        matches!(self, StorageError::CorruptStore { .. })
    }

    /// Check if this error came from a migration step.
    pub fn is_migration_error(&self) -> bool {
        matches!(self, StorageError::Migration(_))
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StorageError::Io { .. } | StorageError::Serialization { .. }
        )
    }
}

impl From<StorageError> for crate::Error {
    fn from(err: StorageError) -> Self {
        crate::Error::Storage(err)
    }
}

impl From<MigrationError> for crate::Error {
    fn from(err: MigrationError) -> Self {
        crate::Error::Storage(StorageError::Migration(err))
    }
}
