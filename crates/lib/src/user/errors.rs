//! Error types for account management.

use thiserror::Error;

/// Errors from user-management operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {user}")]
    UserNotFound { user: String },

    #[error("Username already exists: {username}")]
    UsernameAlreadyExists { username: String },

    #[error("Unknown role: {role}")]
    InvalidRole { role: String },

    /// The caller's role does not allow the operation.
    #[error("Permission denied: {action} requires {required}")]
    PermissionDenied {
        action: &'static str,
        required: &'static str,
    },

    /// Removing or demoting the only remaining Admin.
    #[error("Cannot remove the last administrator")]
    LastAdmin,

    /// `bootstrap_admin` after an Admin already exists.
    #[error("An administrator account already exists")]
    AlreadyBootstrapped,

    /// A persisted user record does not match the expected shape.
    #[error("Malformed user record {id}")]
    MalformedRecord {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UserError {
    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UserError::UserNotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            UserError::PermissionDenied { .. } | UserError::LastAdmin
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            UserError::UsernameAlreadyExists { .. } | UserError::AlreadyBootstrapped
        )
    }
}

impl From<UserError> for crate::Error {
    fn from(err: UserError) -> Self {
        crate::Error::User(err)
    }
}
