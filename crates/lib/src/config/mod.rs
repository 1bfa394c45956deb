//! Configuration for the store and security layer.
//!
//! All recognised options live in [`Config`] and its nested sections. The set
//! is closed: unknown fields in a config file are rejected, and
//! [`Config::from_env`] only reads the variables listed in
//! [`crate::constants::env`].

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::env;
pub use crate::schema::PasswordPolicy;

pub mod errors;

pub use errors::ConfigError;

/// Secret used when no key is configured. Rejected by [`Config::validate`] in production.
pub const DEV_SECRET_KEY: &str = "dev-secret-key-change-in-production";

/// Minimum secret key length accepted in production.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Secret key material used to derive the session token digest key.
///
/// Zeroized on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEV_SECRET_KEY
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self::new(DEV_SECRET_KEY)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Storage engine options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Maximum number of backup snapshots kept (N).
    pub backup_retention: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backup_retention: 10,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashingConfig {
    /// Minimal cost parameters. Only for tests and benchmarks.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: argon2::Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Authentication, lockout and session options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    pub secret_key: SecretKey,
    /// Failed attempts within the window that trigger a lockout (K).
    pub max_failed_attempts: u32,
    /// Rolling window for counting failures (W).
    pub failure_window_secs: u64,
    /// How long an account stays locked (L).
    pub lockout_duration_secs: u64,
    pub session_ttl_secs: u64,
    pub password_policy: PasswordPolicy,
    pub hashing: HashingConfig,
}

impl SecurityConfig {
    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: SecretKey::default(),
            max_failed_attempts: 5,
            failure_window_secs: 15 * 60,
            lockout_duration_secs: 15 * 60,
            session_ttl_secs: 60 * 60,
            password_policy: PasswordPolicy::default(),
            hashing: HashingConfig::default(),
        }
    }
}

/// Audit log options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Top-level configuration, constructed once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data_dir: PathBuf,
    pub environment: Environment,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            environment: Environment::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Overlay values found through `lookup` onto this configuration.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env::DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(environment) = parse_var(&lookup, env::ENVIRONMENT)? {
            self.environment = environment;
        }
        if let Some(secret) = lookup(env::SECRET_KEY) {
            self.security.secret_key = SecretKey::new(secret);
        }

        set_parsed(&lookup, env::BACKUP_RETENTION, &mut self.storage.backup_retention)?;
        set_parsed(&lookup, env::MAX_LOGIN_ATTEMPTS, &mut self.security.max_failed_attempts)?;
        set_parsed(&lookup, env::FAILURE_WINDOW_SECS, &mut self.security.failure_window_secs)?;
        set_parsed(&lookup, env::LOCKOUT_DURATION_SECS, &mut self.security.lockout_duration_secs)?;
        set_parsed(&lookup, env::SESSION_TTL_SECS, &mut self.security.session_ttl_secs)?;

        let policy = &mut self.security.password_policy;
        set_parsed(&lookup, env::PASSWORD_MIN_LENGTH, &mut policy.min_length)?;
        set_parsed(&lookup, env::PASSWORD_REQUIRE_UPPERCASE, &mut policy.require_uppercase)?;
        set_parsed(&lookup, env::PASSWORD_REQUIRE_NUMBER, &mut policy.require_number)?;
        set_parsed(&lookup, env::PASSWORD_REQUIRE_SPECIAL, &mut policy.require_special)?;

        let hashing = &mut self.security.hashing;
        set_parsed(&lookup, env::ARGON2_MEMORY_KIB, &mut hashing.memory_kib)?;
        set_parsed(&lookup, env::ARGON2_ITERATIONS, &mut hashing.iterations)?;
        set_parsed(&lookup, env::ARGON2_PARALLELISM, &mut hashing.parallelism)?;

        set_parsed(&lookup, env::AUDIT_CAPACITY, &mut self.audit.capacity)?;
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::FileIo {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::FileParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check thresholds and the secret key.
    ///
    /// The development secret is accepted outside production with a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backup_retention == 0 {
            return Err(ConfigError::MustBePositive {
                key: "storage.backup_retention",
            });
        }
        if self.security.max_failed_attempts == 0 {
            return Err(ConfigError::MustBePositive {
                key: "security.max_failed_attempts",
            });
        }
        if self.security.failure_window_secs == 0 {
            return Err(ConfigError::MustBePositive {
                key: "security.failure_window_secs",
            });
        }
        if self.security.session_ttl_secs == 0 {
            return Err(ConfigError::MustBePositive {
                key: "security.session_ttl_secs",
            });
        }
        if self.audit.capacity == 0 {
            return Err(ConfigError::MustBePositive {
                key: "audit.capacity",
            });
        }
        if argon2::Params::new(
            self.security.hashing.memory_kib,
            self.security.hashing.iterations,
            self.security.hashing.parallelism,
            None,
        )
        .is_err()
        {
            return Err(ConfigError::InvalidValue {
                key: "security.hashing".to_string(),
                value: format!("{:?}", self.security.hashing),
                reason: "rejected by argon2".to_string(),
            });
        }

        let secret = &self.security.secret_key;
        if secret.expose().is_empty() {
            return Err(ConfigError::InsecureSecret {
                reason: "secret key is empty".to_string(),
            });
        }
        if self.environment == Environment::Production {
            if secret.is_default() {
                return Err(ConfigError::InsecureSecret {
                    reason: "the development secret must be replaced in production".to_string(),
                });
            }
            if secret.expose().len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::InsecureSecret {
                    reason: format!("secret key must be at least {MIN_SECRET_LENGTH} bytes"),
                });
            }
        } else if secret.is_default() {
            tracing::warn!("Using the development secret key; set {}", env::SECRET_KEY);
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn set_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(value) = parse_var(lookup, key)? {
        *slot = value;
    }
    Ok(())
}
