//!
//! Strongbox: the data store and security layer of a project manager.
//!
//! ## Core Concepts
//!
//! * **Store (`storage::Store`)**: A single JSON document of record collections, written
//!   atomically, snapshotted before every write and recovered from the newest valid snapshot
//!   when the primary file is damaged.
//! * **Migrations (`storage::migration`)**: Ordered, idempotent upgrade steps that bring legacy
//!   documents to the current schema version on load.
//! * **Validators (`schema`)**: Field rules for every entity, string sanitization, password
//!   policy and upload path checks. Every save is validated.
//! * **Security (`security::SecurityService`)**: Argon2id credential checks, per-account lockout
//!   and session tokens.
//! * **Users (`user::UserManager`)**: Account CRUD with role policy enforced on top of the store.
//! * **Audit (`audit::AuditLog`)**: A bounded, append-only record of security-relevant events.
//! * **Instance (`Instance`)**: The context object tying all of the above to one [`Config`].

pub mod audit;
pub mod clock;
pub mod config;
pub mod constants;
pub mod instance;
pub mod schema;
pub mod security;
pub mod storage;
pub mod user;

pub use audit::{AuditEntry, AuditEventKind, AuditLog, AuditOutcome};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use instance::Instance;
pub use security::{SecurityService, SessionToken};
pub use storage::{Document, HealthReport, Store};
pub use user::{NewUser, Role, UserInfo, UserManager, UserUpdate};

/// Result type used throughout the Strongbox library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Strongbox library.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured storage errors from the storage module
    #[error(transparent)]
    Storage(storage::StorageError),

    /// Record or input validation failures from the schema module
    #[error(transparent)]
    Validation(schema::ValidationError),

    /// Authentication and session errors from the security module
    #[error(transparent)]
    Auth(security::AuthError),

    /// Account management errors from the user module
    #[error(transparent)]
    User(user::UserError),

    /// Configuration errors
    #[error(transparent)]
    Config(config::ConfigError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Storage(_) => "storage",
            Error::Validation(_) => "schema",
            Error::Auth(_) => "security",
            Error::User(_) => "user",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error rejected invalid input or records.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if the store could not be read or recovered.
    pub fn is_corrupt_store(&self) -> bool {
        match self {
            Error::Storage(storage_err) => storage_err.is_corrupt_store(),
            _ => false,
        }
    }

    /// Check if a schema migration failed.
    pub fn is_migration_error(&self) -> bool {
        match self {
            Error::Storage(storage_err) => storage_err.is_migration_error(),
            _ => false,
        }
    }

    /// Check if this error is authentication-related.
    pub fn is_authentication_error(&self) -> bool {
        match self {
            Error::Auth(auth_err) => auth_err.is_authentication_error(),
            _ => false,
        }
    }

    /// Check if an account is currently locked out.
    pub fn is_lockout(&self) -> bool {
        match self {
            Error::Auth(auth_err) => auth_err.is_lockout(),
            _ => false,
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates permission was denied.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_permission_denied(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Storage(storage_err) => storage_err.is_io_error(),
            Error::Config(config_err) => config_err.is_file_error(),
            _ => false,
        }
    }
}
