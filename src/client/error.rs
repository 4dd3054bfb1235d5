//! Error type shared by the request executor and the session client.
//!
//! Every failure the client can observe resolves to one of these variants.
//! Variants carry owned strings so a failure can be stored in request state
//! and handed to several readers.

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Longest plain-text error body that is shown verbatim
const MAX_TEXT_MESSAGE_LEN: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Failed to reach server: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Authentication required{}", detail_suffix(.message))]
    Unauthorized { message: Option<String> },

    #[error("Server returned error {status}{}", detail_suffix(.message))]
    Http { status: u16, message: Option<String> },

    #[error("Unexpected response: {0}")]
    Shape(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

impl ApiError {
    /// Classify a transport failure. Timeouts are reported separately from
    /// other connection errors.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout)
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Build the error for a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = server_message(body);
        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Http {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// No response was received (connection failure or timeout)
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    /// Human-readable message the server put in its error body, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } | ApiError::Http { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"message": ..}`, `{"error": ".."}` and
/// `{"error": {"message": ..}}`. Short non-JSON bodies are used as-is.
pub fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => message_field(&value),
        Err(_) if trimmed.len() <= MAX_TEXT_MESSAGE_LEN && !trimmed.starts_with('<') => {
            Some(trimmed.to_string())
        }
        Err(_) => None,
    }
}

fn message_field(value: &Value) -> Option<String> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_empty(value.get("message"))
        .or_else(|| non_empty(value.get("error")))
        .or_else(|| non_empty(value.get("error").and_then(|e| e.get("message"))))
}
