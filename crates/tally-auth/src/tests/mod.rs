//! Integration tests for the auth gateway and session manager.
//!
//! - `harness.rs`   - Mock backend and a fully wired test harness
//! - `attach.rs`    - Bearer token attachment
//! - `refresh.rs`   - 401 interception, single coalesced refresh, no double retry
//! - `lifecycle.rs` - Bootstrap, sign-in, register and sign-out

pub(crate) mod harness;
