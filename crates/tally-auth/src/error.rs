//! Authentication error types.

use serde_json::Value;
use thiserror::Error;

/// Failure to complete an HTTP exchange at all (no response received).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend could not be reached.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure (TLS, malformed request, body read).
    #[error("Transport error: {0}")]
    Other(String),
}

/// Why an access-token refresh did not produce a new token.
///
/// Cloneable because the same failure is delivered to the triggering caller
/// and to every request that queued behind the refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// No refresh token is stored.
    #[error("No refresh token")]
    NoRefreshToken,

    /// The backend answered the refresh call with a non-2xx status.
    #[error("Refresh rejected with status {status}")]
    Rejected { status: u16, body: String },

    /// The refresh call never got a response.
    #[error("Refresh transport failure: {0}")]
    Transport(TransportError),

    /// Reading or writing the token store failed during the refresh.
    #[error("Refresh storage failure: {0}")]
    Storage(String),

    /// The session was signed out while the refresh was pending.
    #[error("Refresh cancelled")]
    Cancelled,
}

impl RefreshFailure {
    /// True when the stored refresh token is known to be unusable.
    ///
    /// Only these failures clear the stored credentials; transport problems
    /// and cancellations leave them in place for a later attempt.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            RefreshFailure::NoRefreshToken | RefreshFailure::Rejected { .. }
        )
    }
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Sign-in rejected by the backend
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Access token expired and could not be refreshed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// No response from the backend
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// Backend rejected the payload; body is passed through verbatim
    #[error("Validation failed with status {status}: {body}")]
    Validation { status: u16, body: Value },

    /// 401 on a request that was already retried after a refresh
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-2xx response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tally_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tally_config_and_utils::CoreError> for AuthError {
    fn from(err: tally_config_and_utils::CoreError) -> Self {
        AuthError::Config(err.to_string())
    }
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - timeouts and connection failures
    /// - a refresh that failed for transport reasons
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(TransportError::Timeout | TransportError::Connect(_)) => true,
            AuthError::RefreshFailed(RefreshFailure::Transport(_)) => true,
            AuthError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// True when the caller has to sign in again to continue.
    pub fn requires_sign_in(&self) -> bool {
        match self {
            AuthError::Unauthorized => true,
            AuthError::RefreshFailed(failure) => failure.is_definitive(),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
