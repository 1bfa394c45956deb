//! The Strongbox context object.
//!
//! An [`Instance`] wires the storage engine, the security service, the user
//! manager and the audit log together around one [`Config`]. It is built
//! once at process start and handed to whatever needs it; cloning is cheap.

use std::sync::Arc;

use handle_trait::Handle;

use crate::Result;
use crate::audit::{AuditEntry, AuditLog};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::security::{SecurityService, SessionToken};
use crate::storage::{BackupInfo, Document, HealthReport, Store};
use crate::user::{NewUser, UserId, UserInfo, UserManager, UserUpdate};

/// Internal state for Instance.
///
/// Instance itself is just a cheap-to-clone handle wrapping `Arc<InstanceInternal>`.
#[derive(Debug)]
pub(crate) struct InstanceInternal {
    config: Config,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
    store: Arc<Store>,
    security: Arc<SecurityService>,
    users: UserManager,
}

/// Handle to an opened store and its security layer.
///
/// ## Example
///
/// ```no_run
/// # use strongbox::{Config, Instance};
/// # #[tokio::main]
/// # async fn main() -> strongbox::Result<()> {
/// let instance = Instance::open(Config::with_data_dir("/var/lib/strongbox")).await?;
///
/// instance
///     .users()
///     .bootstrap_admin("admin", "Administrator", "Str0ng!Passw0rd")
///     .await?;
/// let token = instance.authenticate("admin", "Str0ng!Passw0rd").await?;
///
/// let document = instance.load_store().await?;
/// instance.save_store(&document).await?;
/// instance.logout(&token).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Handle)]
pub struct Instance {
    inner: Arc<InstanceInternal>,
}

impl Instance {
    /// Validate `config` and open the store it points at.
    ///
    /// Creates the data directory layout and an empty document on first use.
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_impl(config, Arc::new(SystemClock)).await
    }

    /// Same as [`Instance::open`] with an injected clock.
    ///
    /// Only available with the `testing` feature or in test builds.
    #[cfg(any(test, feature = "testing"))]
    pub async fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open_impl(config, clock).await
    }

    async fn open_impl(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let audit = AuditLog::new(config.audit.capacity, clock.clone());
        let store = Arc::new(
            Store::open(
                config.data_dir.clone(),
                &config.storage,
                clock.clone(),
                audit.clone(),
            )
            .await?,
        );
        let security = Arc::new(SecurityService::new(
            store.clone(),
            &config.security,
            clock.clone(),
            audit.clone(),
        )?);
        let users = UserManager::new(store.clone(), security.clone(), audit.clone(), clock.clone());

        tracing::info!(
            data_dir = %config.data_dir.display(),
            environment = ?config.environment,
            "Opened strongbox instance"
        );

        Ok(Self {
            inner: Arc::new(InstanceInternal {
                config,
                clock,
                audit,
                store,
                security,
                users,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn security(&self) -> &SecurityService {
        &self.inner.security
    }

    pub fn users(&self) -> &UserManager {
        &self.inner.users
    }

    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    // === Store ===

    /// Load the current document, recovering and migrating as needed.
    pub async fn load_store(&self) -> Result<Document> {
        Ok(self.inner.store.load().await?)
    }

    /// Validate and atomically persist a document.
    pub async fn save_store(&self, document: &Document) -> Result<()> {
        self.inner.store.save(document).await
    }

    pub async fn backups(&self) -> Result<Vec<BackupInfo>> {
        Ok(self.inner.store.backups().await?)
    }

    /// Read-only integrity report. Never repairs anything.
    pub async fn health_check(&self) -> Result<HealthReport> {
        Ok(self.inner.store.health_check().await?)
    }

    // === Sessions ===

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken> {
        self.inner.security.authenticate(username, password).await
    }

    pub async fn validate_token(&self, token: &str) -> Result<UserId> {
        Ok(self.inner.security.validate_token(token).await?)
    }

    /// Revoke a session token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) {
        self.inner.security.revoke_token(token).await;
    }

    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.inner
            .users
            .change_password(token, current_password, new_password)
            .await
    }

    // === Users ===

    pub async fn create_user(&self, token: &str, new_user: NewUser) -> Result<UserInfo> {
        self.inner.users.create_user(token, new_user).await
    }

    pub async fn update_user(
        &self,
        token: &str,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<UserInfo> {
        self.inner.users.update_user(token, user_id, update).await
    }

    pub async fn delete_user(&self, token: &str, user_id: &str) -> Result<()> {
        self.inner.users.delete_user(token, user_id).await
    }

    // === Audit ===

    /// Snapshot of the audit log, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.audit.entries()
    }
}
