//! Authenticated access to the Tally backend.
//!
//! This crate owns everything between a feature call and the wire:
//!
//! - [`HttpTransport`]: issues HTTP requests against the configured base URL
//! - [`AuthGateway`]: attaches the bearer token, intercepts 401 responses and
//!   runs a single coalesced access-token refresh for all concurrent callers
//! - [`SessionManager`]: bootstrap, sign-in, registration and sign-out with an
//!   observable [`Session`]
//! - [`DataCache`]: keyed cache of server resources that the session layer
//!   invalidates when the signed-in user changes

pub mod auth_fsm;
pub mod cache;
mod error;
pub mod gateway;
mod refresh;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use auth_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionState};
pub use cache::{DataCache, QueryCache, QueryKey};
pub use error::{AuthError, AuthResult, RefreshFailure, TransportError};
pub use gateway::{AuthGateway, RefreshFailureCallback};
pub use session::{Session, SessionManager, UserProfile};
pub use transport::{
    ApiRequest, ApiResponse, FormPart, HttpTransport, ReqwestTransport, RequestBody,
};

/// Endpoint paths relative to the API base URL.
pub mod endpoints {
    pub const TOKEN: &str = "/auth/token/";
    pub const TOKEN_REFRESH: &str = "/auth/token/refresh/";
    pub const REGISTER: &str = "/auth/register/";
    pub const ME: &str = "/auth/me/";
    pub const CHANGE_PASSWORD: &str = "/auth/change-password/";
}
