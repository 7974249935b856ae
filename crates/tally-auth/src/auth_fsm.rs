//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Uninitialized  │ (initial)
//! └────────┬────────┘
//!          │ Bootstrap
//!          ▼
//! ┌─────────────────┐   NoSession    ┌─────────────────┐
//! │  Bootstrapping  │ ─────────────► │    Anonymous    │ ◄──────────┐
//! └────────┬────────┘                └────────┬────────┘            │
//!          │ SessionRestored                  │ SignInAttempt       │
//!          │                                  ▼                     │
//!          │                         ┌─────────────────┐            │
//!          │                         │    SigningIn    │ ───────────┤ SignInFailed
//!          │                         └────────┬────────┘            │
//!          │                                  │ SignInSuccess       │
//!          ▼                                  ▼                     │
//! ┌─────────────────────────────────────────────────────┐           │
//! │                    Authenticated                    │ ──────────┤ SessionExpired
//! └──────────────────────────┬──────────────────────────┘           │
//!                            │ SignOutRequested                     │
//!                            ▼                                      │
//!                   ┌─────────────────┐  SignOutComplete            │
//!                   │   SigningOut    │ ────────────────────────────┘
//!                   └─────────────────┘
//! ```
//!
//! `SignOutRequested` is accepted from every state so a sign-out can never be
//! refused.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        Bootstrap => Bootstrapping,
        SignOutRequested => SigningOut
    },
    Bootstrapping => {
        SessionRestored => Authenticated,
        NoSession => Anonymous,
        SignOutRequested => SigningOut
    },
    Anonymous => {
        SignInAttempt => SigningIn,
        SignOutRequested => SigningOut
    },
    SigningIn => {
        SignInSuccess => Authenticated,
        SignInFailed => Anonymous,
        SignOutRequested => SigningOut
    },
    Authenticated => {
        // Refresh token rejected during normal operation
        SessionExpired => Anonymous,
        SignOutRequested => SigningOut
    },
    SigningOut => {
        SignOutComplete => Anonymous,
        SignOutRequested => SigningOut
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Bootstrap has not run yet.
    Uninitialized,
    /// Restoring a stored session.
    Bootstrapping,
    /// No user signed in.
    Anonymous,
    /// Sign-in in progress.
    SigningIn,
    /// User signed in with a validated session.
    Authenticated,
    /// Sign-out in progress.
    SigningOut,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::Bootstrapping | SessionState::SigningIn | SessionState::SigningOut
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Uninitialized => SessionState::Uninitialized,
            SessionMachineState::Bootstrapping => SessionState::Bootstrapping,
            SessionMachineState::Anonymous => SessionState::Anonymous,
            SessionMachineState::SigningIn => SessionState::SigningIn,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::SigningOut => SessionState::SigningOut,
        }
    }
}
