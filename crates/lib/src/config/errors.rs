//! Error types for configuration loading and validation.

use thiserror::Error;

/// Errors raised while building or validating a [`crate::Config`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or file field held an unparsable value.
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// The option name (environment variable or field path)
        key: String,
        /// The rejected raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A numeric option that must be positive was zero.
    #[error("{key} must be greater than zero")]
    MustBePositive {
        /// The option name
        key: &'static str,
    },

    /// The secret key is unsuitable for the current environment.
    #[error("Insecure secret key: {reason}")]
    InsecureSecret {
        /// Why the key was rejected
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file {path}")]
    FileIo {
        /// Path of the config file
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file {path}")]
    FileParse {
        /// Path of the config file
        path: String,
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Check if this error came from reading or parsing a config file.
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            ConfigError::FileIo { .. } | ConfigError::FileParse { .. }
        )
    }
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}
