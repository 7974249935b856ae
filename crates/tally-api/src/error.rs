//! Finance client error types.

use tally_auth::AuthError;
use thiserror::Error;

/// Error type for finance API operations.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request failed in the auth layer or was rejected by the backend
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Response did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Rejected before sending
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// True when the user has to sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, ApiError::Auth(e) if e.requires_sign_in())
    }
}

/// Result type for finance API operations.
pub type ApiResult<T> = Result<T, ApiError>;
