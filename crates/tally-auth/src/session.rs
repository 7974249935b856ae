//! Session management on top of the auth gateway.
//!
//! `SessionManager` owns the observable [`Session`] and an internal FSM that
//! tracks transient states (bootstrapping, signing in, signing out). The
//! tokens themselves live only in the secret store; the session holds the
//! profile of the signed-in user.

use crate::auth_fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::cache::DataCache;
use crate::endpoints;
use crate::gateway::AuthGateway;
use crate::transport::ApiRequest;
use crate::{AuthError, AuthResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Weak};
use tally_storage::{CredentialPair, CredentialState, CredentialStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Profile of the signed-in user as returned by `GET /auth/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Observable session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<UserProfile>,
    /// True until the first bootstrap has finished.
    pub loading: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
    refresh: String,
}

/// State shared with the gateway's refresh-failure callback.
struct SessionShared {
    fsm: Mutex<SessionMachine>,
    session: watch::Sender<Session>,
    cache: Arc<dyn DataCache>,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().state())
    }

    /// Transition the FSM, logging the change.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut fsm = self.fsm.lock();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
        }

        Ok(new_state)
    }

    fn publish(&self, user: Option<UserProfile>) {
        self.session.send_replace(Session {
            user,
            loading: false,
        });
    }

    /// The backend rejected the refresh token; the gateway already cleared it.
    fn expire(&self) {
        if let Err(e) = self.transition(&SessionMachineInput::SessionExpired) {
            debug!(error = %e, "Refresh failure outside an authenticated session");
        }
        if self.session.borrow().user.is_some() {
            info!("Session expired");
            self.publish(None);
        }
        self.cache.clear();
    }
}

/// Session manager: bootstrap, sign-in, register and sign-out.
pub struct SessionManager {
    gateway: Arc<AuthGateway>,
    shared: Arc<SessionShared>,
}

impl SessionManager {
    /// Create a session manager and hook it into the gateway's refresh
    /// failure notifications.
    pub fn new(gateway: Arc<AuthGateway>, cache: Arc<dyn DataCache>) -> Self {
        let (session, _) = watch::channel(Session::default());
        let shared = Arc::new(SessionShared {
            fsm: Mutex::new(SessionMachine::new()),
            session,
            cache,
        });

        let weak: Weak<SessionShared> = Arc::downgrade(&shared);
        gateway.set_refresh_failure_callback(Arc::new(move |_failure| {
            if let Some(shared) = weak.upgrade() {
                shared.expire();
            }
        }));

        Self { gateway, shared }
    }

    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<dyn DataCache> {
        &self.shared.cache
    }

    fn credentials(&self) -> &CredentialStore {
        self.gateway.credentials()
    }

    /// Current FSM state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.shared.session.borrow().clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.shared.session.borrow().user.clone()
    }

    /// Receive every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.session.subscribe()
    }

    /// Restore a stored session.
    ///
    /// Always finishes with `loading == false`. A missing or partial pair, or
    /// a pair the backend rejects, leaves the session anonymous with both
    /// tokens deleted. When the profile cannot be reached at all (timeout,
    /// connection failure, 5xx) the session is anonymous but the pair is
    /// kept for the next bootstrap.
    pub async fn bootstrap(&self) -> AuthResult<Session> {
        self.shared.transition(&SessionMachineInput::Bootstrap)?;

        let user = match self.credentials().state().await {
            Ok(CredentialState::Complete(_)) => match self.fetch_profile().await {
                Ok(user) => Some(user),
                Err(e) if rejects_stored_session(&e) => {
                    warn!(error = %e, "Stored session rejected, clearing");
                    self.discard_credentials().await;
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Stored session could not be validated, keeping credentials");
                    None
                }
            },
            Ok(CredentialState::Partial) => {
                warn!("Found partial credential pair, clearing");
                self.discard_credentials().await;
                None
            }
            Ok(CredentialState::Empty) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                self.discard_credentials().await;
                None
            }
        };

        let input = if user.is_some() {
            SessionMachineInput::SessionRestored
        } else {
            SessionMachineInput::NoSession
        };

        match self.shared.transition(&input) {
            Ok(_) => {
                if let Some(user) = &user {
                    info!(user_id = user.id, "Session restored");
                }
                self.shared.publish(user);
            }
            Err(e) => {
                // Signed out while bootstrapping.
                debug!(error = %e, "Bootstrap superseded");
                self.shared.publish(None);
            }
        }

        Ok(self.session())
    }

    /// Exchange credentials for a token pair and load the profile.
    ///
    /// A rejection by the backend leaves the session as it was. If the
    /// profile cannot be loaded the new tokens are deleted again.
    pub async fn sign_in(&self, username: &str, password: &str) -> AuthResult<UserProfile> {
        self.shared.transition(&SessionMachineInput::SignInAttempt)?;

        match self.sign_in_inner(username, password).await {
            Ok(user) => {
                if let Err(e) = self.shared.transition(&SessionMachineInput::SignInSuccess) {
                    // Signed out while signing in.
                    self.discard_credentials().await;
                    return Err(e);
                }
                info!(user_id = user.id, "Signed in");
                self.shared.publish(Some(user.clone()));
                self.shared.cache.invalidate_all();
                Ok(user)
            }
            Err(e) => {
                let _ = self.shared.transition(&SessionMachineInput::SignInFailed);
                Err(e)
            }
        }
    }

    async fn sign_in_inner(&self, username: &str, password: &str) -> AuthResult<UserProfile> {
        let request = ApiRequest::post(endpoints::TOKEN)
            .json(json!({ "username": username, "password": password }))
            .anonymous();
        let response = self.gateway.send(request).await?;

        if matches!(response.status, 400 | 401) {
            return Err(AuthError::InvalidCredentials);
        }
        let tokens: TokenResponse = response.error_for_status()?.json()?;

        self.credentials()
            .store_pair(&CredentialPair::new(tokens.access, tokens.refresh))
            .await?;

        match self.fetch_profile().await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "Signed in but the profile could not be loaded");
                self.discard_credentials().await;
                Err(e)
            }
        }
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// A 400/422 is returned as [`AuthError::Validation`] with the backend's
    /// field errors untouched.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<UserProfile> {
        if self.state() != SessionState::Anonymous {
            return Err(AuthError::InvalidStateTransition(format!(
                "Cannot register in state {:?}",
                self.state()
            )));
        }

        let request = ApiRequest::post(endpoints::REGISTER)
            .json(json!({ "username": username, "email": email, "password": password }))
            .anonymous();
        self.gateway.send(request).await?.error_for_status()?;
        info!(username = %username, "Registered");

        self.sign_in(username, password).await
    }

    /// Sign out.
    ///
    /// Requests waiting on a token refresh are rejected, both tokens are
    /// deleted, the user is cleared and the cache emptied. The session ends
    /// anonymous even if deleting a token fails; that error is returned.
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.shared.transition(&SessionMachineInput::SignOutRequested)?;

        self.gateway.cancel_refresh();
        let cleared = self.credentials().clear().await;

        self.shared.publish(None);
        self.shared.cache.clear();
        self.shared.transition(&SessionMachineInput::SignOutComplete)?;
        info!("Signed out");

        cleared.map_err(AuthError::from)
    }

    /// Fetch the profile of the signed-in user through the gateway.
    pub async fn fetch_profile(&self) -> AuthResult<UserProfile> {
        self.gateway.get_json(ApiRequest::get(endpoints::ME)).await
    }

    async fn discard_credentials(&self) {
        if let Err(e) = self.credentials().clear().await {
            warn!(error = %e, "Failed to clear credentials");
        }
    }
}

/// Whether a profile failure means the stored pair is no longer accepted,
/// as opposed to the backend being unreachable.
fn rejects_stored_session(error: &AuthError) -> bool {
    match error {
        AuthError::Api { status, .. } => (400..500).contains(status),
        AuthError::Validation { .. } => true,
        other => other.requires_sign_in(),
    }
}
