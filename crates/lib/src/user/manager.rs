//! Account management on top of the store and the security service.
//!
//! Role policy is enforced here: the storage engine persists whatever valid
//! records it is given.

use std::sync::Arc;

use super::errors::UserError;
use super::records;
use super::types::{NewUser, Role, UserId, UserInfo, UserRecord, UserUpdate};
use crate::Result;
use crate::audit::{AuditEventKind, AuditLog, AuditOutcome};
use crate::clock::Clock;
use crate::schema::{self, FieldIssue, IssueKind, ValidationError};
use crate::security::{AuthError, SecurityService};
use crate::storage::Store;

const MAX_DISPLAY_NAME: usize = 100;

/// User CRUD, password changes and admin operations.
#[derive(Debug)]
pub struct UserManager {
    store: Arc<Store>,
    security: Arc<SecurityService>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
}

fn check_display_name(display_name: &str, issues: &mut Vec<FieldIssue>) {
    if display_name.trim().is_empty() {
        issues.push(FieldIssue::new("display_name", IssueKind::Empty, "must not be empty"));
    } else if display_name.chars().count() > MAX_DISPLAY_NAME {
        issues.push(FieldIssue::new(
            "display_name",
            IssueKind::TooLong,
            format!("must be at most {MAX_DISPLAY_NAME} characters"),
        ));
    }
}

fn check_email(email: &str, issues: &mut Vec<FieldIssue>) {
    if !email.is_empty()
        && let Err(err) = schema::validate_email(email)
    {
        issues.extend(err.issues);
    }
}

fn check_password(policy: &schema::PasswordPolicy, password: &str, issues: &mut Vec<FieldIssue>) {
    if let Err(err) = policy.check(password) {
        issues.extend(err.issues);
    }
}

impl UserManager {
    pub fn new(
        store: Arc<Store>,
        security: Arc<SecurityService>,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            security,
            audit,
            clock,
        }
    }

    /// Resolve a session token to its (enabled) user.
    async fn caller(&self, token: &str) -> Result<UserRecord> {
        let user_id = self.security.validate_token(token).await?;
        let document = self.store.load().await?;
        match records::get(&document, &user_id)? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::InvalidToken.into()),
        }
    }

    async fn require_admin(&self, token: &str, action: &'static str) -> Result<UserRecord> {
        let caller = self.caller(token).await?;
        if caller.role.is_admin() {
            return Ok(caller);
        }
        self.deny(&caller, action);
        Err(UserError::PermissionDenied {
            action,
            required: Role::Admin.as_str(),
        }
        .into())
    }

    fn deny(&self, caller: &UserRecord, action: &str) {
        tracing::info!(user_id = %caller.id, action, "Permission denied");
        self.audit.event(
            &caller.id,
            AuditEventKind::PermissionDenied,
            AuditOutcome::Denied,
            Some(action.to_string()),
        );
    }

    /// Create the first administrator.
    ///
    /// Allowed only while no Admin can log in: on an empty store, or when
    /// every Admin is a migrated account still awaiting a password reset.
    /// An existing account with the same username is promoted and given
    /// the new password.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<UserInfo> {
        let mut issues = Vec::new();
        if let Err(issue) = schema::validate_username(username) {
            issues.push(issue);
        }
        check_display_name(display_name, &mut issues);
        check_password(self.security.password_policy(), password, &mut issues);
        ValidationError::from_issues(issues)?;

        let hash = self.security.hash_password(password)?;
        let now = self.clock.now_millis();

        let info = self
            .store
            .transact(|document| {
                if records::has_usable_admin(document)? {
                    return Err(UserError::AlreadyBootstrapped.into());
                }
                let mut user = match records::find_by_username(document, username)? {
                    Some(existing) => existing,
                    None => UserRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        username: username.to_string(),
                        display_name: display_name.to_string(),
                        role: Role::Admin,
                        email: None,
                        is_active: true,
                        password_hash: None,
                        salt: None,
                        lockout: Default::default(),
                        recent_failures: Vec::new(),
                        last_success_at: None,
                        created_at: Some(now),
                        must_reset_password: false,
                        extra: Default::default(),
                    },
                };
                user.role = Role::Admin;
                user.is_active = true;
                user.display_name = display_name.to_string();
                SecurityService::apply_password(&mut user, hash);
                records::put(document, &user)?;
                Ok(user.info())
            })
            .await?;

        tracing::info!(user_id = %info.id, username = %info.username, "Bootstrapped administrator");
        self.audit.event(
            &info.id,
            AuditEventKind::AdminBootstrapped,
            AuditOutcome::Success,
            None,
        );
        Ok(info)
    }

    /// Create an account. Admin only.
    pub async fn create_user(&self, token: &str, new_user: NewUser) -> Result<UserInfo> {
        let caller = self.require_admin(token, "create_user").await?;

        let mut issues = Vec::new();
        if let Err(issue) = schema::validate_username(&new_user.username) {
            issues.push(issue);
        }
        let display_name = new_user
            .display_name
            .clone()
            .unwrap_or_else(|| new_user.username.clone());
        check_display_name(&display_name, &mut issues);
        let email = new_user.email.clone().filter(|e| !e.is_empty());
        if let Some(email) = &email {
            check_email(email, &mut issues);
        }
        check_password(self.security.password_policy(), &new_user.password, &mut issues);
        ValidationError::from_issues(issues)?;

        let hash = self.security.hash_password(&new_user.password)?;
        let mut user = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: new_user.username.clone(),
            display_name,
            role: new_user.role,
            email,
            is_active: true,
            password_hash: None,
            salt: None,
            lockout: Default::default(),
            recent_failures: Vec::new(),
            last_success_at: None,
            created_at: Some(self.clock.now_millis()),
            must_reset_password: false,
            extra: Default::default(),
        };
        SecurityService::apply_password(&mut user, hash);

        let info = self
            .store
            .transact(|document| {
                if records::find_by_username(document, &user.username)?.is_some() {
                    return Err(UserError::UsernameAlreadyExists {
                        username: user.username.clone(),
                    }
                    .into());
                }
                records::put(document, &user)?;
                Ok(user.info())
            })
            .await?;

        tracing::info!(user_id = %info.id, role = %info.role, "User created");
        self.audit.event(
            &caller.id,
            AuditEventKind::UserCreated,
            AuditOutcome::Success,
            Some(format!("{} ({})", info.username, info.role)),
        );
        Ok(info)
    }

    /// Update profile fields. Callers may edit their own display name and
    /// email; role and `is_active` changes require Admin.
    pub async fn update_user(
        &self,
        token: &str,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<UserInfo> {
        let caller = self.caller(token).await?;
        let is_self = caller.id == user_id;
        if !caller.role.is_admin() && (!is_self || update.requires_admin()) {
            self.deny(&caller, "update_user");
            return Err(UserError::PermissionDenied {
                action: "update_user",
                required: Role::Admin.as_str(),
            }
            .into());
        }

        let mut issues = Vec::new();
        if let Some(display_name) = &update.display_name {
            check_display_name(display_name, &mut issues);
        }
        if let Some(email) = &update.email {
            check_email(email, &mut issues);
        }
        ValidationError::from_issues(issues)?;

        let (before, after) = self
            .store
            .transact(|document| {
                let before = records::get(document, user_id)?.ok_or_else(|| {
                    UserError::UserNotFound {
                        user: user_id.to_string(),
                    }
                })?;
                let mut user = before.clone();
                if let Some(display_name) = &update.display_name {
                    user.display_name = display_name.clone();
                }
                if let Some(email) = &update.email {
                    user.email = (!email.is_empty()).then(|| email.clone());
                }
                if let Some(role) = update.role {
                    user.role = role;
                }
                if let Some(is_active) = update.is_active {
                    user.is_active = is_active;
                }

                let loses_admin = before.role == Role::Admin
                    && before.is_active
                    && !(user.role == Role::Admin && user.is_active);
                if loses_admin && records::active_admin_count(document)? <= 1 {
                    return Err(UserError::LastAdmin.into());
                }

                records::put(document, &user)?;
                Ok((before, user))
            })
            .await?;

        if before.is_active && !after.is_active {
            self.security.revoke_user_sessions(&after.id, None).await;
        }
        if before.role != after.role {
            tracing::info!(user_id = %after.id, from = %before.role, to = %after.role, "Role changed");
            self.audit.event(
                &caller.id,
                AuditEventKind::RoleChanged,
                AuditOutcome::Success,
                Some(format!("{}: {} -> {}", after.username, before.role, after.role)),
            );
        }
        self.audit.event(
            &caller.id,
            AuditEventKind::UserUpdated,
            AuditOutcome::Success,
            Some(after.username.clone()),
        );
        Ok(after.info())
    }

    /// Change a user's role. Admin only; the last Admin cannot be demoted.
    pub async fn set_role(&self, token: &str, user_id: &str, role: Role) -> Result<UserInfo> {
        let caller = self.caller(token).await?;
        if !caller.role.is_admin() {
            self.deny(&caller, "set_role");
            return Err(UserError::PermissionDenied {
                action: "set_role",
                required: Role::Admin.as_str(),
            }
            .into());
        }
        self.update_user(
            token,
            user_id,
            UserUpdate {
                role: Some(role),
                ..UserUpdate::default()
            },
        )
        .await
    }

    /// Delete an account and revoke its sessions. Admin only; the last
    /// Admin cannot be deleted.
    pub async fn delete_user(&self, token: &str, user_id: &str) -> Result<()> {
        let caller = self.require_admin(token, "delete_user").await?;

        let removed = self
            .store
            .transact(|document| {
                let user = records::get(document, user_id)?.ok_or_else(|| {
                    UserError::UserNotFound {
                        user: user_id.to_string(),
                    }
                })?;
                if user.role == Role::Admin
                    && user.is_active
                    && records::active_admin_count(document)? <= 1
                {
                    return Err(UserError::LastAdmin.into());
                }
                records::remove(document, user_id);
                Ok(user)
            })
            .await?;

        self.security.revoke_user_sessions(&removed.id, None).await;
        tracing::info!(user_id = %removed.id, "User deleted");
        self.audit.event(
            &caller.id,
            AuditEventKind::UserDeleted,
            AuditOutcome::Success,
            Some(removed.username),
        );
        Ok(())
    }

    /// Change the caller's own password.
    ///
    /// Requires re-entering the current password; a wrong one counts toward
    /// lockout. All other sessions of the user are revoked; the calling
    /// session stays valid.
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let caller = self.caller(token).await?;

        if let Err(err) = self.security.reverify(&caller.id, current_password).await {
            if err.is_authentication_error() {
                tracing::info!(user_id = %caller.id, "Password change refused, re-verification failed");
                self.audit.event(
                    &caller.id,
                    AuditEventKind::PasswordChanged,
                    AuditOutcome::Failure,
                    Some("current password did not verify".to_string()),
                );
            }
            return Err(err);
        }

        self.security.password_policy().check(new_password)?;
        let hash = self.security.hash_password(new_password)?;

        self.store
            .transact(|document| {
                let mut user = records::get(document, &caller.id)?
                    .ok_or(AuthError::InvalidToken)?;
                SecurityService::apply_password(&mut user, hash);
                records::put(document, &user)
            })
            .await?;

        self.security
            .revoke_user_sessions(&caller.id, Some(token))
            .await;
        tracing::info!(user_id = %caller.id, "Password changed");
        self.audit.event(
            &caller.id,
            AuditEventKind::PasswordChanged,
            AuditOutcome::Success,
            None,
        );
        Ok(())
    }

    /// Set a new password for another user. Admin only. Clears lockout and
    /// pending-reset state and revokes the user's sessions.
    pub async fn reset_password(&self, token: &str, user_id: &str, new_password: &str) -> Result<()> {
        let caller = self.require_admin(token, "reset_password").await?;
        self.security.password_policy().check(new_password)?;
        let hash = self.security.hash_password(new_password)?;

        let username = self
            .store
            .transact(|document| {
                let mut user = records::get(document, user_id)?.ok_or_else(|| {
                    UserError::UserNotFound {
                        user: user_id.to_string(),
                    }
                })?;
                SecurityService::apply_password(&mut user, hash);
                records::put(document, &user)?;
                Ok(user.username)
            })
            .await?;

        self.security.revoke_user_sessions(user_id, None).await;
        tracing::info!(user_id, "Password reset by administrator");
        self.audit.event(
            &caller.id,
            AuditEventKind::PasswordReset,
            AuditOutcome::Success,
            Some(username),
        );
        Ok(())
    }

    /// Clear a lockout. Admin only.
    pub async fn unlock_user(&self, token: &str, user_id: &str) -> Result<()> {
        let caller = self.require_admin(token, "unlock_user").await?;
        self.security.unlock(user_id).await?;
        self.audit.event(
            &caller.id,
            AuditEventKind::AccountUnlocked,
            AuditOutcome::Success,
            Some(user_id.to_string()),
        );
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserInfo> {
        let document = self.store.load().await?;
        records::get(&document, user_id)?
            .map(|user| user.info())
            .ok_or_else(|| {
                UserError::UserNotFound {
                    user: user_id.to_string(),
                }
                .into()
            })
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserInfo>> {
        let document = self.store.load().await?;
        Ok(records::find_by_username(&document, username)?.map(|user| user.info()))
    }

    /// All accounts, sorted by username.
    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let document = self.store.load().await?;
        let mut users: Vec<UserInfo> = records::all(&document)?
            .iter()
            .map(UserRecord::info)
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// The user behind a session token.
    pub async fn current_user(&self, token: &str) -> Result<UserInfo> {
        Ok(self.caller(token).await?.info())
    }

    /// Id of the user behind a session token.
    pub async fn current_user_id(&self, token: &str) -> Result<UserId> {
        Ok(self.caller(token).await?.id)
    }
}
