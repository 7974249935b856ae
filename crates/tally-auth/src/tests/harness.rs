//! Test harness for gateway and session tests.
//!
//! Provides:
//! - MockBackend: an in-process [`HttpTransport`] that behaves like the token
//!   endpoints of the real backend and records every request it receives
//! - TestHarness: wires a MockBackend, a MemorySecretStore, the gateway, a
//!   QueryCache and a SessionManager together

use crate::cache::{DataCache, QueryCache};
use crate::endpoints;
use crate::gateway::AuthGateway;
use crate::session::{SessionManager, UserProfile};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody};
use crate::TransportError;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally_storage::{MemorySecretStore, SecretStore, StorageKeys};

/// A request as seen by the backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

/// How the refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Validate the refresh token and issue this access token.
    Issue(String),
    /// Issue this access token but never accept it.
    IssueRevoked(String),
    /// Answer with this status regardless of the token.
    Reject(u16),
    /// Fail at the transport level.
    Timeout,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    profile: UserProfile,
}

struct BackendState {
    accounts: HashMap<String, Account>,
    /// access token -> username
    access_tokens: HashMap<String, String>,
    /// refresh token -> username
    refresh_tokens: HashMap<String, String>,
    /// Pair handed out by the next successful sign-in.
    next_pair: (String, String),
    refresh_behavior: RefreshBehavior,
    refresh_delay: Duration,
    /// Fixed responses for non-auth routes, served to authorized callers.
    routes: HashMap<(Method, String), Value>,
    /// Status returned by `/auth/me/` instead of the profile.
    me_status: Option<u16>,
    /// Paths that answer only after a delay.
    slow_paths: HashMap<String, Duration>,
    /// Paths that fail at the transport level.
    unreachable_paths: HashMap<String, TransportError>,
    requests: Vec<RecordedRequest>,
}

/// In-process stand-in for the backend.
pub struct MockBackend {
    state: Mutex<BackendState>,
    refresh_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                accounts: HashMap::new(),
                access_tokens: HashMap::new(),
                refresh_tokens: HashMap::new(),
                next_pair: ("A1".to_string(), "R1".to_string()),
                refresh_behavior: RefreshBehavior::Issue("A2".to_string()),
                refresh_delay: Duration::from_millis(50),
                routes: HashMap::new(),
                me_status: None,
                slow_paths: HashMap::new(),
                unreachable_paths: HashMap::new(),
                requests: Vec::new(),
            }),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Register a user the backend knows about.
    pub fn add_user(&self, id: i64, username: &str, email: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                profile: UserProfile {
                    id,
                    username: username.to_string(),
                    email: email.to_string(),
                    avatar: None,
                },
            },
        );
    }

    /// Make `access`/`refresh` valid tokens for `username`.
    pub fn grant(&self, username: &str, access: &str, refresh: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .access_tokens
            .insert(access.to_string(), username.to_string());
        state
            .refresh_tokens
            .insert(refresh.to_string(), username.to_string());
    }

    /// Expire an access token; requests carrying it now get 401.
    pub fn expire_access(&self, access: &str) {
        self.state.lock().unwrap().access_tokens.remove(access);
    }

    pub fn set_next_pair(&self, access: &str, refresh: &str) {
        self.state.lock().unwrap().next_pair = (access.to_string(), refresh.to_string());
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        self.state.lock().unwrap().refresh_behavior = behavior;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().unwrap().refresh_delay = delay;
    }

    pub fn set_me_status(&self, status: Option<u16>) {
        self.state.lock().unwrap().me_status = status;
    }

    /// Delay every answer on `path`; the token is checked after the delay.
    pub fn slow_path(&self, path: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .slow_paths
            .insert(path.to_string(), delay);
    }

    /// Fail every request to `path` with `error` instead of answering.
    pub fn unreachable(&self, path: &str, error: TransportError) {
        self.state
            .lock()
            .unwrap()
            .unreachable_paths
            .insert(path.to_string(), error);
    }

    /// Serve `body` for `method path` to authorized callers.
    pub fn route(&self, method: Method, path: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert((method, path.to_string()), body);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests to `path`, in arrival order.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn record(&self, request: &ApiRequest) -> Option<Value> {
        let body = match &request.body {
            Some(RequestBody::Json(value)) => Some(value.clone()),
            _ => None,
        };
        self.state.lock().unwrap().requests.push(RecordedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            authorization: request.authorization().map(str::to_string),
            body: body.clone(),
        });
        body
    }

    fn caller(&self, request: &ApiRequest) -> Option<String> {
        let token = request.authorization()?.strip_prefix("Bearer ")?;
        self.state.lock().unwrap().access_tokens.get(token).cloned()
    }

    fn obtain_pair(&self, body: &Value) -> ApiResponse {
        let username = body["username"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();

        let mut state = self.state.lock().unwrap();
        let valid = state
            .accounts
            .get(username)
            .is_some_and(|account| account.password == password);
        if !valid {
            return ApiResponse::json_body(
                401,
                &json!({"detail": "No active account found with the given credentials"}),
            );
        }

        let (access, refresh) = state.next_pair.clone();
        state
            .access_tokens
            .insert(access.clone(), username.to_string());
        state
            .refresh_tokens
            .insert(refresh.clone(), username.to_string());
        ApiResponse::json_body(200, &json!({"access": access, "refresh": refresh}))
    }

    async fn refresh(&self, body: &Value) -> Result<ApiResponse, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().refresh_delay;
        tokio::time::sleep(delay).await;

        let mut state = self.state.lock().unwrap();
        match state.refresh_behavior.clone() {
            RefreshBehavior::Timeout => Err(TransportError::Timeout),
            RefreshBehavior::Reject(status) => Ok(ApiResponse::json_body(
                status,
                &json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            )),
            RefreshBehavior::IssueRevoked(access) => {
                Ok(ApiResponse::json_body(200, &json!({"access": access})))
            }
            RefreshBehavior::Issue(access) => {
                let refresh = body["refresh"].as_str().unwrap_or_default();
                match state.refresh_tokens.get(refresh).cloned() {
                    Some(username) => {
                        state.access_tokens.insert(access.clone(), username);
                        Ok(ApiResponse::json_body(200, &json!({"access": access})))
                    }
                    None => Ok(ApiResponse::json_body(
                        401,
                        &json!({"detail": "Token is invalid or expired"}),
                    )),
                }
            }
        }
    }

    fn register(&self, body: &Value) -> ApiResponse {
        let username = body["username"].as_str().unwrap_or_default().to_string();
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default().to_string();

        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(&username) {
            return ApiResponse::json_body(
                400,
                &json!({"username": ["A user with that username already exists."]}),
            );
        }
        let id = state.accounts.len() as i64 + 1;
        state.accounts.insert(
            username.clone(),
            Account {
                password,
                profile: UserProfile {
                    id,
                    username: username.clone(),
                    email: email.clone(),
                    avatar: None,
                },
            },
        );
        ApiResponse::json_body(201, &json!({"username": username, "email": email}))
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let body = self.record(request).unwrap_or(Value::Null);

        if request.method == Method::POST {
            match request.path.as_str() {
                endpoints::TOKEN => return Ok(self.obtain_pair(&body)),
                endpoints::TOKEN_REFRESH => return self.refresh(&body).await,
                endpoints::REGISTER => return Ok(self.register(&body)),
                _ => {}
            }
        }

        let failure = self
            .state
            .lock()
            .unwrap()
            .unreachable_paths
            .get(&request.path)
            .cloned();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let delay = self.state.lock().unwrap().slow_paths.get(&request.path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let Some(username) = self.caller(request) else {
            return Ok(ApiResponse::json_body(
                401,
                &json!({"detail": "Given token not valid for any token type"}),
            ));
        };

        let state = self.state.lock().unwrap();
        if request.path == endpoints::ME {
            if let Some(status) = state.me_status {
                return Ok(ApiResponse::json_body(status, &json!({"detail": "error"})));
            }
            let profile = state
                .accounts
                .get(&username)
                .map(|account| account.profile.clone());
            return Ok(match profile {
                Some(profile) => ApiResponse::json_body(200, &json!({ "data": profile })),
                None => ApiResponse::json_body(404, &json!({"detail": "Not found."})),
            });
        }

        Ok(
            match state
                .routes
                .get(&(request.method.clone(), request.path.clone()))
            {
                Some(body) => ApiResponse::json_body(200, &json!({ "data": body })),
                None => ApiResponse::json_body(404, &json!({"detail": "Not found."})),
            },
        )
    }
}

/// Everything a gateway or session test needs.
pub struct TestHarness {
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemorySecretStore>,
    pub gateway: Arc<AuthGateway>,
    pub cache: Arc<QueryCache>,
    pub session: SessionManager,
}

impl TestHarness {
    /// Harness with user `alice` (id 1, password `pw`) and an empty store.
    pub fn new() -> Self {
        Self::with_store(MemorySecretStore::new(), true)
    }

    /// Harness whose store already holds `access`/`refresh`, both valid
    /// for alice.
    pub fn signed_in(access: &str, refresh: &str) -> Self {
        let harness = Self::with_store(
            MemorySecretStore::with_entries([
                (StorageKeys::ACCESS_TOKEN, access),
                (StorageKeys::REFRESH_TOKEN, refresh),
            ]),
            true,
        );
        harness.backend.grant("alice", access, refresh);
        harness
    }

    pub fn with_store(store: MemorySecretStore, sign_out_on_refresh_failure: bool) -> Self {
        let backend = Arc::new(MockBackend::new());
        backend.add_user(1, "alice", "alice@example.com", "pw");

        let store = Arc::new(store);
        let gateway = Arc::new(
            AuthGateway::new(backend.clone(), store.clone())
                .with_sign_out_on_refresh_failure(sign_out_on_refresh_failure),
        );
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let session = SessionManager::new(gateway.clone(), cache.clone() as Arc<dyn DataCache>);

        Self {
            backend,
            store,
            gateway,
            cache,
            session,
        }
    }

    pub async fn stored_access(&self) -> Option<String> {
        self.store.get(StorageKeys::ACCESS_TOKEN).await.unwrap()
    }

    pub async fn stored_refresh(&self) -> Option<String> {
        self.store.get(StorageKeys::REFRESH_TOKEN).await.unwrap()
    }
}
