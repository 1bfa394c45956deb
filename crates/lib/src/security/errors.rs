//! Error types for authentication and sessions.

use thiserror::Error;

/// Authentication and session failures.
///
/// Messages are deliberately generic: they never reveal whether an account
/// exists or which check failed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown user, wrong password, disabled account or pending reset.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Too many recent failures.
    #[error("Account is locked, try again in {retry_after_minutes} minute(s)")]
    LockedOut {
        /// Minutes until the lock lapses, rounded up
        retry_after_minutes: u64,
    },

    /// Unknown, expired or revoked session token.
    #[error("Invalid or expired session")]
    InvalidToken,

    /// Password hashing could not run (bad parameters).
    #[error("Password hashing failed: {reason}")]
    HashingFailed { reason: String },
}

impl AuthError {
    /// Check if this error means the caller failed to prove identity.
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, AuthError::InvalidCredentials | AuthError::InvalidToken)
    }

    pub fn is_lockout(&self) -> bool {
        matches!(self, AuthError::LockedOut { .. })
    }

    /// Minutes to wait, when locked out.
    pub fn retry_after_minutes(&self) -> Option<u64> {
        match self {
            AuthError::LockedOut {
                retry_after_minutes,
            } => Some(*retry_after_minutes),
            _ => None,
        }
    }
}

impl From<AuthError> for crate::Error {
    fn from(err: AuthError) -> Self {
        crate::Error::Auth(err)
    }
}
