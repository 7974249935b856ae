//! Authenticated request gateway.
//!
//! Every feature request goes through [`AuthGateway::send`], which:
//!
//! 1. reads the access token from the secret store and attaches it as
//!    `Authorization: Bearer <token>` (no header when there is no token)
//! 2. on a 401, refreshes the access token once and re-issues the request
//! 3. coalesces concurrent 401s so only one refresh call is ever in flight
//!
//! A request is re-issued at most once; a second 401 fails with
//! [`AuthError::Unauthorized`].

use crate::endpoints;
use crate::refresh::{RefreshCoordinator, RefreshOutcome, RefreshRole, RefreshTicket};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
use crate::{AuthError, AuthResult, RefreshFailure};
use parking_lot::Mutex;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tally_config_and_utils::Config;
use tally_storage::{CredentialStore, SecretStore};
use tracing::{debug, info, warn};

/// Callback invoked after a definitive refresh failure cleared the credentials.
pub type RefreshFailureCallback = Arc<dyn Fn(&RefreshFailure) + Send + Sync>;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

/// Attaches credentials to requests and recovers from access-token expiry.
pub struct AuthGateway {
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    refresh: RefreshCoordinator,
    /// Clear the stored pair when the backend rejects a refresh.
    sign_out_on_refresh_failure: bool,
    failure_callback: Mutex<Option<RefreshFailureCallback>>,
}

impl AuthGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn SecretStore>) -> Self {
        Self {
            transport,
            credentials: CredentialStore::new(store),
            refresh: RefreshCoordinator::new(),
            sign_out_on_refresh_failure: true,
            failure_callback: Mutex::new(None),
        }
    }

    /// Build a gateway over a `reqwest` transport configured from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn SecretStore>) -> AuthResult<Self> {
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport), store)
            .with_sign_out_on_refresh_failure(config.sign_out_on_refresh_failure))
    }

    pub fn with_sign_out_on_refresh_failure(mut self, enabled: bool) -> Self {
        self.sign_out_on_refresh_failure = enabled;
        self
    }

    /// Set a callback to be notified when a rejected refresh ends the session.
    ///
    /// Called at most once per failed refresh, by the request that ran it,
    /// and never with the callback slot locked.
    pub fn set_refresh_failure_callback(&self, callback: RefreshFailureCallback) {
        *self.failure_callback.lock() = Some(callback);
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Whether a refresh call is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Number of requests parked behind the running refresh.
    pub fn pending_requests(&self) -> usize {
        self.refresh.waiter_count()
    }

    /// Reject all parked requests with [`RefreshFailure::Cancelled`].
    ///
    /// A refresh that is still running when this is called will not persist
    /// its token.
    pub fn cancel_refresh(&self) -> usize {
        let cancelled = self.refresh.cancel();
        if cancelled > 0 {
            info!(cancelled, "Cancelled requests waiting on token refresh");
        }
        cancelled
    }

    /// Send a request with token attachment and transparent refresh.
    ///
    /// Any status other than 401 is returned as-is; use
    /// [`ApiResponse::error_for_status`] or the typed helpers to map it.
    pub async fn send(&self, mut request: ApiRequest) -> AuthResult<ApiResponse> {
        if request.anonymous {
            return Ok(self.transport.execute(&request).await?);
        }

        let sent_token = self.credentials.access_token().await?;
        let response = self.dispatch(&request, sent_token.as_deref()).await?;
        if response.status != 401 {
            return Ok(response);
        }

        if request.retried {
            return Err(AuthError::Unauthorized);
        }
        request.retried = true;

        // A refresh that finished while this request was in flight already
        // produced a newer token.
        if let Some(current) = self.credentials.access_token().await? {
            if sent_token.as_deref() != Some(current.as_str()) {
                debug!(path = %request.path, "Access token changed in flight; re-issuing");
                return self.reissue(&request, &current).await;
            }
        }

        let token = match self.refresh.begin() {
            RefreshRole::Waiter(rx) => {
                debug!(path = %request.path, "Waiting on in-flight token refresh");
                rx.await.unwrap_or(Err(RefreshFailure::Cancelled))?
            }
            RefreshRole::Leader(ticket) => self.run_refresh(ticket).await?,
        };

        self.reissue(&request, &token).await
    }

    /// Send and map non-2xx statuses to errors.
    pub async fn send_checked(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.send(request).await?.error_for_status()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> AuthResult<T> {
        self.send_checked(request).await?.json()
    }

    /// Send `body` as JSON and decode the response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        body: &impl Serialize,
    ) -> AuthResult<T> {
        let request = request.json(serde_json::to_value(body)?);
        self.send_checked(request).await?.json()
    }

    /// Send and discard the response body.
    pub async fn execute(&self, request: ApiRequest) -> AuthResult<()> {
        self.send_checked(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> AuthResult<ApiResponse> {
        match token {
            Some(token) => {
                let mut authed = request.clone();
                authed.headers.insert(AUTHORIZATION, bearer(token)?);
                Ok(self.transport.execute(&authed).await?)
            }
            None => {
                let mut plain = request.clone();
                plain.headers.remove(AUTHORIZATION);
                Ok(self.transport.execute(&plain).await?)
            }
        }
    }

    async fn reissue(&self, request: &ApiRequest, token: &str) -> AuthResult<ApiResponse> {
        let response = self.dispatch(request, Some(token)).await?;
        if response.status == 401 {
            warn!(path = %request.path, "Request rejected again after token refresh");
            return Err(AuthError::Unauthorized);
        }
        Ok(response)
    }

    /// Run the refresh as leader, then release every waiter.
    async fn run_refresh(&self, ticket: RefreshTicket<'_>) -> Result<String, RefreshFailure> {
        info!("Access token rejected, refreshing");

        let outcome = match self.exchange_refresh_token().await {
            Ok(tokens) => self.persist_refreshed(&ticket, tokens).await,
            Err(failure) => Err(failure),
        };

        let released = self.refresh.settle(ticket, &outcome);

        match &outcome {
            Ok(_) => info!(released, "Access token refreshed"),
            Err(failure) => {
                warn!(released, error = %failure, "Token refresh failed");
                if failure.is_definitive() {
                    self.end_session(failure).await;
                }
            }
        }

        outcome
    }

    async fn exchange_refresh_token(&self) -> Result<RefreshResponse, RefreshFailure> {
        let refresh_token = match self.credentials.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(RefreshFailure::NoRefreshToken),
            Err(e) => return Err(RefreshFailure::Storage(e.to_string())),
        };

        let request = ApiRequest::post(endpoints::TOKEN_REFRESH)
            .json(json!({ "refresh": refresh_token }))
            .anonymous();

        let response = self
            .transport
            .execute(&request)
            .await
            .map_err(RefreshFailure::Transport)?;

        if !response.is_success() {
            return Err(RefreshFailure::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        response.json().map_err(|_| RefreshFailure::Rejected {
            status: response.status,
            body: response.text(),
        })
    }

    async fn persist_refreshed(
        &self,
        ticket: &RefreshTicket<'_>,
        tokens: RefreshResponse,
    ) -> RefreshOutcome {
        if !self.refresh.is_current(ticket) {
            return Err(RefreshFailure::Cancelled);
        }

        self.credentials
            .set_access_token(&tokens.access)
            .await
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?;

        if let Some(rotated) = tokens.refresh.as_deref() {
            self.credentials
                .secret_store()
                .set(tally_storage::StorageKeys::REFRESH_TOKEN, rotated)
                .await
                .map_err(|e| RefreshFailure::Storage(e.to_string()))?;
        }

        // Signed out while the token was being written.
        if !self.refresh.is_current(ticket) {
            if let Err(e) = self.credentials.clear().await {
                warn!(error = %e, "Failed to discard token refreshed after sign-out");
            }
            return Err(RefreshFailure::Cancelled);
        }

        Ok(tokens.access)
    }

    async fn end_session(&self, failure: &RefreshFailure) {
        if !self.sign_out_on_refresh_failure {
            return;
        }

        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "Failed to clear credentials after refresh failure");
        }

        let callback = self.failure_callback.lock().clone();
        if let Some(callback) = callback {
            callback(failure);
        }
    }
}

fn bearer(token: &str) -> AuthResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
        AuthError::Config("stored access token is not a valid header value".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}
