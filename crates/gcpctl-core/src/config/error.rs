//! Error types for configuration loading

use thiserror::Error;

/// Errors that can occur while resolving [`Settings`](super::Settings)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration error: required environment variable {name} is not set")]
    MissingVariable { name: &'static str },

    #[error("Configuration error: invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
