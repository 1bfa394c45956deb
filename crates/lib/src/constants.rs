//! Constants used throughout the Strongbox library.
//!
//! Central definitions for file names, reserved collection names and the
//! environment variables recognised by [`crate::Config::from_env`].

/// File name of the current store document inside the data directory.
pub const STORE_FILE: &str = "store.json";

/// Suffix of the in-flight temporary file written before the atomic rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Directory (relative to the data directory) holding backup snapshots.
pub const BACKUP_DIR: &str = "backups";

/// File name prefix of backup snapshots; followed by a zero-padded millisecond timestamp.
pub const BACKUP_PREFIX: &str = "store-backup-";

/// File name extension of backup snapshots.
pub const BACKUP_EXTENSION: &str = ".json";

/// Collection holding user accounts.
pub const USERS: &str = "users";

/// Collection holding projects.
pub const PROJECTS: &str = "projects";

/// Collection holding standalone tasks.
pub const TASKS: &str = "tasks";

/// Collection holding comment threads.
pub const COMMENTS: &str = "comments";

/// Collection holding invoices.
pub const INVOICES: &str = "invoices";

/// Collection holding bookable resources.
pub const RESOURCES: &str = "resources";

/// Collection holding uploaded file metadata.
pub const ATTACHMENTS: &str = "attachments";

/// Tracing target used for audit events.
pub const AUDIT_TARGET: &str = "strongbox::audit";

/// Environment variable names read by `Config::from_env`.
pub mod env {
    pub const DATA_DIR: &str = "STRONGBOX_DATA_DIR";
    pub const ENVIRONMENT: &str = "STRONGBOX_ENV";
    pub const BACKUP_RETENTION: &str = "STRONGBOX_BACKUP_RETENTION";
    pub const SECRET_KEY: &str = "STRONGBOX_SECRET_KEY";
    pub const MAX_LOGIN_ATTEMPTS: &str = "STRONGBOX_MAX_LOGIN_ATTEMPTS";
    pub const FAILURE_WINDOW_SECS: &str = "STRONGBOX_FAILURE_WINDOW_SECS";
    pub const LOCKOUT_DURATION_SECS: &str = "STRONGBOX_LOCKOUT_DURATION_SECS";
    pub const SESSION_TTL_SECS: &str = "STRONGBOX_SESSION_TTL_SECS";
    pub const PASSWORD_MIN_LENGTH: &str = "STRONGBOX_PASSWORD_MIN_LENGTH";
    pub const PASSWORD_REQUIRE_UPPERCASE: &str = "STRONGBOX_PASSWORD_REQUIRE_UPPERCASE";
    pub const PASSWORD_REQUIRE_NUMBER: &str = "STRONGBOX_PASSWORD_REQUIRE_NUMBER";
    pub const PASSWORD_REQUIRE_SPECIAL: &str = "STRONGBOX_PASSWORD_REQUIRE_SPECIAL";
    pub const ARGON2_MEMORY_KIB: &str = "STRONGBOX_ARGON2_MEMORY_KIB";
    pub const ARGON2_ITERATIONS: &str = "STRONGBOX_ARGON2_ITERATIONS";
    pub const ARGON2_PARALLELISM: &str = "STRONGBOX_ARGON2_PARALLELISM";
    pub const AUDIT_CAPACITY: &str = "STRONGBOX_AUDIT_CAPACITY";
}
