//! HTTP client for the monitoring API.
//!
//! `ApiClient` attaches the session's bearer token to every call, unwraps
//! response envelopes, and logs the session out when the server answers 401.
//! `RequestExecutor` adds per-call state tracking on top of it.

mod envelope;
mod error;
mod executor;
mod transport;

pub use envelope::{extract_token, parse_body, unwrap_envelope};
pub use error::{server_message, ApiError};
pub use executor::{RequestExecutor, RequestState};
pub use transport::{Method, RequestConfig, Transport};

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::session::SessionManager;

#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Client talking to the same API the session logs into
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            transport: session.transport().clone(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Fresh executor with empty state
    pub fn executor(&self) -> RequestExecutor {
        RequestExecutor::new(self.clone())
    }

    /// Send one authenticated request and return the unwrapped payload.
    pub async fn send(&self, config: &RequestConfig) -> Result<Value, ApiError> {
        let token = self.session.token();

        match self.transport.execute(config, token.as_deref()).await {
            Ok(body) => Ok(unwrap_envelope(body)),
            Err(err) => {
                if err.is_unauthorized() {
                    warn!(path = %config.path, "Server rejected the session token; logging out");
                    self.session.logout();
                }
                Err(err)
            }
        }
    }
}
