//! Bounded, append-only security audit log.
//!
//! Entries live in memory in arrival order. Once the log holds `capacity`
//! entries the oldest is discarded on every append. Each entry is also
//! emitted as a `tracing` event on the `strongbox::audit` target so a
//! subscriber can persist it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, millis_to_rfc3339};
use crate::constants::AUDIT_TARGET;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    LoginSuccess,
    LoginFailure,
    AccountLocked,
    LockedOutAttempt,
    Logout,
    PasswordChanged,
    PasswordReset,
    AccountUnlocked,
    AdminBootstrapped,
    UserCreated,
    UserUpdated,
    RoleChanged,
    UserDeleted,
    PermissionDenied,
    IntegrityRecovery,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoginSuccess => "auth.login.success",
            Self::LoginFailure => "auth.login.failure",
            Self::AccountLocked => "auth.account.locked",
            Self::LockedOutAttempt => "auth.login.locked",
            Self::Logout => "auth.logout",
            Self::PasswordChanged => "auth.password.changed",
            Self::PasswordReset => "auth.password.reset",
            Self::AccountUnlocked => "auth.account.unlocked",
            Self::AdminBootstrapped => "user.admin.bootstrapped",
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::RoleChanged => "user.role.changed",
            Self::UserDeleted => "user.deleted",
            Self::PermissionDenied => "authz.denied",
            Self::IntegrityRecovery => "store.integrity.recovery",
        };
        f.write_str(name)
    }
}

/// How it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
    /// A multi-step operation started; a later entry carries its result.
    Attempted,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
            Self::Attempted => "attempted",
        };
        f.write_str(name)
    }
}

/// One security-relevant event. Never mutated after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp_millis: u64,
    /// User id, username or `system`
    pub actor: String,
    pub kind: AuditEventKind,
    pub outcome: AuditOutcome,
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(
        timestamp_millis: u64,
        actor: impl Into<String>,
        kind: AuditEventKind,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp_millis,
            actor: actor.into(),
            kind,
            outcome,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// RFC 3339 rendering of the timestamp.
    pub fn timestamp(&self) -> String {
        millis_to_rfc3339(self.timestamp_millis)
    }
}

#[derive(Debug)]
struct AuditLogInner {
    capacity: usize,
    clock: Arc<dyn Clock>,
    entries: RwLock<VecDeque<AuditEntry>>,
}

/// Shared handle to the audit log. Clones see the same entries.
#[derive(Debug, Clone)]
pub struct AuditLog {
    inner: Arc<AuditLogInner>,
}

impl AuditLog {
    /// Create a log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(AuditLogInner {
                capacity,
                clock,
                entries: RwLock::new(VecDeque::with_capacity(capacity)),
            }),
        }
    }

    /// Append an entry, evicting the oldest beyond capacity.
    pub fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: AUDIT_TARGET,
            kind = %entry.kind,
            outcome = %entry.outcome,
            actor = %entry.actor,
            detail = entry.detail.as_deref().unwrap_or(""),
            "audit"
        );

        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.inner.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Stamp an event with the current time and record it.
    pub fn event(
        &self,
        actor: impl Into<String>,
        kind: AuditEventKind,
        outcome: AuditOutcome,
        detail: Option<String>,
    ) {
        let mut entry = AuditEntry::new(self.inner.clock.now_millis(), actor, kind, outcome);
        entry.detail = detail;
        self.record(entry);
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.read().iter().cloned().collect()
    }

    pub fn entries_for_actor(&self, actor: &str) -> Vec<AuditEntry> {
        self.read()
            .iter()
            .filter(|entry| entry.actor == actor)
            .cloned()
            .collect()
    }

    pub fn entries_of_kind(&self, kind: AuditEventKind) -> Vec<AuditEntry> {
        self.read()
            .iter()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<AuditEntry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
