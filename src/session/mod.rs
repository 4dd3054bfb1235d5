//! Session management: the single owner of the bearer token.
//!
//! `SessionManager` reads the persisted token at startup, logs in and out,
//! and writes every token change through to the `TokenStore` before
//! publishing it to subscribers. The request executor only reads the token
//! and calls `logout` when the server answers 401.

mod store;

pub use store::{normalize_stored_token, FileTokenStore, MemoryTokenStore, TokenStore};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{extract_token, RequestConfig, Transport};

/// Shown when the server gives no reason for a failed login
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";

/// Shown when the login response carries no recognizable token
pub const NO_TOKEN_MESSAGE: &str = "No token received from server";

/// Login form values. Sent as `{username, password, ip, port}`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Address of the monitored server
    #[serde(rename = "ip")]
    pub host: String,
    pub port: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub host: Option<String>,
    /// User object returned by the server, if it sent one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

#[derive(Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    /// Message from the last failed login attempt
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// First characters of the token, safe for logs and status output
    pub fn token_preview(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("{}...", t.chars().take(10).collect::<String>()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token_preview())
            .field("user", &self.user)
            .field("error", &self.error)
            .finish()
    }
}

/// Result of a login attempt. Failures are values, not errors, so callers
/// can render them next to the form.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success { user: User },
    Failure { error: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoginOutcome::Success { .. } => None,
            LoginOutcome::Failure { error } => Some(error.as_str()),
        }
    }
}

pub struct SessionManager {
    transport: Transport,
    store: Box<dyn TokenStore>,
    state: watch::Sender<Session>,
}

impl SessionManager {
    /// Build the manager from whatever token is already persisted.
    ///
    /// Legacy object-shaped values are normalized here and written back as a
    /// plain token, so nothing else has to tolerate them.
    pub fn initialize(transport: Transport, store: impl TokenStore + 'static) -> Self {
        let token = match store.load() {
            Ok(Some(raw)) => {
                let token = normalize_stored_token(&raw);
                if token != raw {
                    info!("Rewriting stored session token as a plain string");
                    if let Err(e) = store.save(&token) {
                        warn!(error = %e, "Failed to rewrite stored session token");
                    }
                }
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session token");
                None
            }
        };

        debug!(authenticated = token.is_some(), "Session initialized");

        let (state, _) = watch::channel(Session {
            token,
            ..Default::default()
        });

        Self {
            transport,
            store: Box::new(store),
            state,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receive every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Log in against `POST /login`.
    pub async fn login(&self, credentials: &Credentials) -> LoginOutcome {
        self.state.send_modify(|session| session.error = None);

        info!(
            username = %credentials.username,
            host = %credentials.host,
            "Logging in"
        );

        let body = match serde_json::to_value(credentials) {
            Ok(body) => body,
            Err(e) => return self.fail_login(format!("Invalid login request: {}", e)),
        };

        let response = match self
            .transport
            .execute(&RequestConfig::post("/login", body), None)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login request failed");
                let message = e
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string());
                return self.fail_login(message);
            }
        };

        let Some(token) = extract_token(&response) else {
            warn!("Login response did not contain a token");
            return self.fail_login(NO_TOKEN_MESSAGE.to_string());
        };

        let profile = response
            .get("user")
            .or_else(|| response.get("data").and_then(|data| data.get("user")))
            .filter(|user| !user.is_null())
            .cloned();

        let user = User {
            username: credentials.username.clone(),
            host: Some(credentials.host.clone()),
            profile,
        };

        self.replace(Some(token), Some(user.clone()));
        info!(username = %user.username, "Logged in");

        LoginOutcome::Success { user }
    }

    /// Clear the session locally, then tell the server in the background.
    ///
    /// Local state is cleared before this returns, whatever happens to the
    /// remote call. The returned handle (present when a token was cleared and
    /// a runtime is available) resolves once the server was notified; callers
    /// that do not care can drop it.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let previous = self.replace(None, None);
        info!("Logged out");

        let token = previous?;
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!("No async runtime; skipping remote logout");
                return None;
            }
        };

        let transport = self.transport.clone();
        Some(runtime.spawn(async move {
            let request = RequestConfig::post("/logout", json!({}));
            match transport.execute(&request, Some(&token)).await {
                Ok(_) => debug!("Remote logout acknowledged"),
                Err(e) => warn!(error = %e, "Remote logout failed"),
            }
        }))
    }

    /// Swap token and user, persisting first. Returns the previous token.
    fn replace(&self, token: Option<String>, user: Option<User>) -> Option<String> {
        let mut previous = None;

        self.state.send_modify(|session| {
            let persisted = match &token {
                Some(token) => self.store.save(token),
                None => self.store.clear(),
            };
            if let Err(e) = persisted {
                warn!(error = %e, "Failed to persist session token");
            }

            previous = std::mem::replace(&mut session.token, token);
            session.user = user;
        });

        previous
    }

    fn fail_login(&self, message: String) -> LoginOutcome {
        self.state
            .send_modify(|session| session.error = Some(message.clone()));
        LoginOutcome::Failure { error: message }
    }
}
