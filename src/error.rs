//! Error types for the throttler
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Boxed error used for transport causes
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for the throttler
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Dispatch Errors
    // ============================================================================
    #[error("Transport failure: {source}")]
    Transport {
        #[source]
        source: BoxError,
    },

    #[error("Failed to read response body after {received} bytes: {message}")]
    BodyRead { received: usize, message: String },

    /// Every attempt was retryable. The cause of the last attempt (status,
    /// marker or transport error) is logged at warn level, not carried here.
    #[error("Retries exceeded ({retry_limit})")]
    RetriesExceeded { retry_limit: u32 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request body cannot be replayed for another attempt")]
    RequestNotReplayable,

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error from any cause
    pub fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport {
            source: source.into(),
        }
    }

    /// Check if a caller could reasonably try the whole dispatch again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::RetriesExceeded { .. } | Error::Cancelled
        )
    }
}

/// Result type alias for the throttler
pub type Result<T> = std::result::Result<T, Error>;
