//! Authentication, lockout and session management.
//!
//! [`SecurityService`] verifies credentials against user records in the
//! store, maintains the lockout state machine through atomic store
//! transactions, and issues session tokens held in a [`SessionStore`].
//!
//! Every path that touches credentials or lockout state records an audit
//! entry before it returns.

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::audit::{AuditEventKind, AuditLog, AuditOutcome};
use crate::clock::Clock;
use crate::config::{HashingConfig, SecurityConfig};
use crate::schema::PasswordPolicy;
use crate::storage::Store;
use crate::user::{UserError, UserId, UserRecord, records};

pub mod crypto;
pub mod errors;
pub mod lockout;
pub mod session;

pub use crypto::{generate_token, hash_password, verify_password};
pub use errors::AuthError;
pub use lockout::{LockCheck, LockoutPolicy, retry_after_minutes};
pub use session::{Session, SessionStore, SessionToken};

/// Outcome of the lockout transaction for one password check.
enum Attempt {
    Success { user: UserRecord, released: bool },
    Failed { locked: bool, released: bool },
    Locked(Duration),
    Vanished,
}

/// Credential checks, lockout and sessions.
#[derive(Debug)]
pub struct SecurityService {
    store: Arc<Store>,
    sessions: SessionStore,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    hashing: HashingConfig,
    password_policy: PasswordPolicy,
    session_ttl: Duration,
    /// Verified for unknown users so both paths cost one argon2 run
    dummy_hash: String,
}

impl SecurityService {
    pub fn new(
        store: Arc<Store>,
        config: &SecurityConfig,
        clock: Arc<dyn Clock>,
        audit: AuditLog,
    ) -> std::result::Result<Self, AuthError> {
        let (dummy_hash, _) = hash_password(generate_token(), &config.hashing)?;
        Ok(Self {
            store,
            sessions: SessionStore::new(crypto::TokenHasher::new(&config.secret_key)),
            audit,
            clock,
            policy: LockoutPolicy::from_config(config),
            hashing: config.hashing,
            password_policy: config.password_policy.clone(),
            session_ttl: config.session_ttl(),
            dummy_hash,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn lockout_policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    /// Hash a password with the configured argon2 cost.
    pub fn hash_password(&self, password: &str) -> std::result::Result<(String, String), AuthError> {
        hash_password(password, &self.hashing)
    }

    /// Store a new password hash on `user` and clear reset and lockout state.
    pub(crate) fn apply_password(user: &mut UserRecord, hash: (String, String)) {
        let (password_hash, salt) = hash;
        user.password_hash = Some(password_hash);
        user.salt = Some(salt);
        user.must_reset_password = false;
        LockoutPolicy::unlock(user);
    }

    /// Check a password against a record without touching lockout state.
    pub fn check_password(&self, user: &UserRecord, password: &str) -> bool {
        match &user.password_hash {
            Some(hash) => verify_password(password, hash),
            None => {
                verify_password(password, &self.dummy_hash);
                false
            }
        }
    }

    fn fail(&self, actor: &str, kind: AuditEventKind, detail: &str) {
        self.audit
            .event(actor, kind, AuditOutcome::Failure, Some(detail.to_string()));
    }

    /// Verify credentials and issue a session token.
    ///
    /// Unknown users, wrong passwords, disabled accounts and accounts awaiting
    /// a password reset all yield the same [`AuthError::InvalidCredentials`].
    /// A locked account yields [`AuthError::LockedOut`] without checking the
    /// password.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken> {
        let document = self.store.load().await?;
        let Some(mut user) = records::find_by_username(&document, username)? else {
            verify_password(password, &self.dummy_hash);
            tracing::debug!(username, "Login for unknown user");
            self.fail(username, AuditEventKind::LoginFailure, "unknown user");
            return Err(AuthError::InvalidCredentials.into());
        };

        // Fast path; the transaction below re-evaluates against fresh state.
        if let LockCheck::Locked { remaining } = self.policy.check(&mut user, self.clock.now_millis()) {
            return Err(self.locked_out(&user.id, remaining));
        }

        if !user.is_active || user.must_reset_password || user.password_hash.is_none() {
            self.check_password(&user, password);
            let reason = if !user.is_active {
                "account disabled"
            } else {
                "password reset required"
            };
            tracing::info!(user_id = %user.id, reason, "Login refused");
            self.fail(&user.id, AuditEventKind::LoginFailure, reason);
            return Err(AuthError::InvalidCredentials.into());
        }

        let verified = self.check_password(&user, password);
        match self.settle_attempt(&user.id, verified).await? {
            Attempt::Success { user, released } => {
                if released {
                    self.lock_released(&user.id);
                }
                let token = self
                    .sessions
                    .create_session(&user.id, self.clock.now_millis(), self.session_ttl)
                    .await;
                tracing::info!(user_id = %user.id, "Login succeeded");
                self.audit
                    .event(&user.id, AuditEventKind::LoginSuccess, AuditOutcome::Success, None);
                Ok(token)
            }
            Attempt::Failed { locked, released } => {
                if released {
                    self.lock_released(&user.id);
                }
                tracing::info!(user_id = %user.id, locked, "Login failed");
                self.fail(&user.id, AuditEventKind::LoginFailure, "wrong password");
                if locked {
                    self.lock_engaged(&user.id);
                }
                Err(AuthError::InvalidCredentials.into())
            }
            Attempt::Locked(remaining) => Err(self.locked_out(&user.id, remaining)),
            Attempt::Vanished => {
                self.fail(username, AuditEventKind::LoginFailure, "unknown user");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    /// Re-check the password of a signed-in user before a sensitive change.
    ///
    /// A wrong password counts toward lockout exactly like a failed login,
    /// and a locked account is refused without checking the password.
    pub async fn reverify(&self, user_id: &str, password: &str) -> Result<()> {
        let document = self.store.load().await?;
        let mut user = records::get(&document, user_id)?.ok_or(AuthError::InvalidToken)?;
        if let LockCheck::Locked { remaining } = self.policy.check(&mut user, self.clock.now_millis()) {
            return Err(self.locked_out(user_id, remaining));
        }

        let verified = self.check_password(&user, password);
        match self.settle_attempt(user_id, verified).await? {
            Attempt::Success { released, .. } => {
                if released {
                    self.lock_released(user_id);
                }
                Ok(())
            }
            Attempt::Failed { locked, released } => {
                if released {
                    self.lock_released(user_id);
                }
                tracing::info!(user_id, locked, "Password re-verification failed");
                if locked {
                    self.lock_engaged(user_id);
                }
                Err(AuthError::InvalidCredentials.into())
            }
            Attempt::Locked(remaining) => Err(self.locked_out(user_id, remaining)),
            Attempt::Vanished => Err(AuthError::InvalidToken.into()),
        }
    }

    /// Apply the result of a password check to the stored lockout state.
    ///
    /// Runs under the store write lock so concurrent attempts cannot lose
    /// failures. The lock state is re-evaluated against the fresh record.
    async fn settle_attempt(&self, user_id: &str, verified: bool) -> Result<Attempt> {
        let policy = self.policy;
        let clock = self.clock.clone();
        let user_id = user_id.to_string();
        self.store
            .transact(move |document| {
                let Some(mut user) = records::get(document, &user_id)? else {
                    return Ok(Attempt::Vanished);
                };
                let now = clock.now_millis();
                let released = match policy.check(&mut user, now) {
                    LockCheck::Locked { remaining } => return Ok(Attempt::Locked(remaining)),
                    LockCheck::Released => true,
                    LockCheck::Open => false,
                };
                let attempt = if verified {
                    policy.record_success(&mut user, now);
                    Attempt::Success {
                        user: user.clone(),
                        released,
                    }
                } else {
                    Attempt::Failed {
                        locked: policy.record_failure(&mut user, now),
                        released,
                    }
                };
                records::put(document, &user)?;
                Ok(attempt)
            })
            .await
    }

    fn lock_engaged(&self, user_id: &str) {
        tracing::warn!(user_id, "Account locked after repeated failures");
        self.audit.event(
            user_id,
            AuditEventKind::AccountLocked,
            AuditOutcome::Success,
            Some(format!("{} failed attempts", self.policy.max_failed_attempts)),
        );
    }

    fn lock_released(&self, user_id: &str) {
        tracing::info!(user_id, "Lockout elapsed, account active again");
        self.audit.event(
            user_id,
            AuditEventKind::AccountUnlocked,
            AuditOutcome::Success,
            Some("lockout elapsed".to_string()),
        );
    }

    fn locked_out(&self, user_id: &str, remaining: Duration) -> crate::Error {
        let retry_after_minutes = retry_after_minutes(remaining);
        tracing::info!(user_id, retry_after_minutes, "Login refused, account locked");
        self.audit.event(
            user_id,
            AuditEventKind::LockedOutAttempt,
            AuditOutcome::Denied,
            Some(format!("retry after {retry_after_minutes} minute(s)")),
        );
        AuthError::LockedOut {
            retry_after_minutes,
        }
        .into()
    }

    /// Owner of a live session. Unknown, expired and revoked tokens are
    /// indistinguishable.
    pub async fn validate_token(&self, token: &str) -> std::result::Result<UserId, AuthError> {
        self.sessions
            .lookup(token, self.clock.now_millis())
            .await
            .ok_or(AuthError::InvalidToken)
    }

    /// Revoke a session token. Always succeeds.
    pub async fn revoke_token(&self, token: &str) {
        if let Some(user_id) = self.sessions.revoke(token).await {
            tracing::debug!(user_id = %user_id, "Session revoked");
            self.audit
                .event(&user_id, AuditEventKind::Logout, AuditOutcome::Success, None);
        }
    }

    /// Revoke all sessions of a user except `keep`.
    pub async fn revoke_user_sessions(&self, user_id: &str, keep: Option<&str>) -> usize {
        let revoked = self.sessions.revoke_user(user_id, keep).await;
        if revoked > 0 {
            tracing::debug!(user_id, revoked, "Revoked user sessions");
        }
        revoked
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.active_count(self.clock.now_millis()).await
    }

    /// Clear lockout state of a user.
    pub async fn unlock(&self, user_id: &str) -> Result<()> {
        self.store
            .transact(|document| {
                let mut user = records::get(document, user_id)?.ok_or_else(|| {
                    UserError::UserNotFound {
                        user: user_id.to_string(),
                    }
                })?;
                LockoutPolicy::unlock(&mut user);
                records::put(document, &user)
            })
            .await?;
        tracing::info!(user_id, "Account unlocked");
        Ok(())
    }
}
