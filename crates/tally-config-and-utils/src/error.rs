//! Core error types shared across the workspace.

use thiserror::Error;

/// Core error type for configuration and filesystem operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither `TALLY_HOME` nor a user home directory is available
    #[error("Could not determine home directory; set TALLY_HOME")]
    NoHomeDir,
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
