//! Core data types for user accounts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::UserError;

/// Stable identifier of a user record (UUID v4 for new accounts).
pub type UserId = String;

/// Account role, lowest privilege first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    User,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::User, Role::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::User => "User",
            Role::Viewer => "Viewer",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Whether the role may create or modify business records.
    pub fn can_write(self) -> bool {
        self >= Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UserError::InvalidRole {
                role: s.to_string(),
            })
    }
}

/// Lockout state machine. Locked accounts unlock lazily on the next
/// attempt once the lockout duration has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockoutState {
    #[default]
    Active,
    Locked {
        /// Millisecond timestamp of the failure that triggered the lock
        since: u64,
    },
}

fn default_true() -> bool {
    true
}

/// A user account as persisted in the `users` collection.
///
/// The record is keyed by `id`. Passwords exist only as an argon2id PHC hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Argon2id PHC string; `None` until a password is set
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Salt embedded in `password_hash`, kept for inspection
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub lockout: LockoutState,
    /// Timestamps of failed attempts inside the rolling window
    #[serde(default)]
    pub recent_failures: Vec<u64>,
    #[serde(default)]
    pub last_success_at: Option<u64>,
    #[serde(default)]
    pub created_at: Option<u64>,
    /// Set for accounts that cannot log in until an admin resets the password
    #[serde(default)]
    pub must_reset_password: bool,
    /// Fields not modelled here, such as a legacy `last_login`. Written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("lockout", &self.lockout)
            .field("failed_attempts", &self.recent_failures.len())
            .field("must_reset_password", &self.must_reset_password)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    pub fn is_locked(&self) -> bool {
        matches!(self.lockout, LockoutState::Locked { .. })
    }

    /// Failed-attempt counter.
    pub fn failed_attempts(&self) -> usize {
        self.recent_failures.len()
    }

    /// Credential-free view of this record.
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            email: self.email.clone(),
            is_active: self.is_active,
            is_locked: self.is_locked(),
            must_reset_password: self.must_reset_password,
            created_at: self.created_at,
            last_success_at: self.last_success_at,
        }
    }
}

/// Public view of a user, without credential fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_locked: bool,
    pub must_reset_password: bool,
    pub created_at: Option<u64>,
    pub last_success_at: Option<u64>,
}

/// Input for creating an account. The password is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[zeroize(skip)]
    pub role: Role,
    pub password: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, role: Role, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            email: None,
            role,
            password: password.into(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("role", &self.role)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Partial update of an account. `None` leaves a field unchanged; an empty
/// `email` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    /// Whether the update touches fields only an Admin may change.
    pub fn requires_admin(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}
