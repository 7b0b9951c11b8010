//! Preload error types

use thiserror::Error;

/// Preload operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreloadError {
    #[error("Unit not registered: {name}")]
    NotFound { name: String },

    #[error("Loader for '{name}' failed: {message}")]
    LoaderFailure { name: String, message: String },

    #[error("Gave up waiting for '{name}' after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for PreloadError {
    fn from(err: config::ConfigError) -> Self {
        PreloadError::Config(err.to_string())
    }
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, PreloadError>;
