//! Error types
//!
//! Crate-level errors for decoding and configuration. Feed and endpoint
//! failures have their own types in [`crate::feed`] and [`crate::requester`]
//! because they are reported through channels rather than returned.

use std::fmt;

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// A document could not be decoded
    Decode(serde_json::Error),
    /// Invalid configuration
    Config(ConfigError),
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Path template has no `{user}` placeholder
    MissingUserPlaceholder(String),
    /// Endpoint function name is empty
    EmptyFunctionName,
    /// Request timeout must be non-zero
    ZeroTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingUserPlaceholder(template) => {
                write!(f, "path template has no {{user}} placeholder: {}", template)
            }
            ConfigError::EmptyFunctionName => write!(f, "function name is empty"),
            ConfigError::ZeroTimeout => write!(f, "request timeout is zero"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}
