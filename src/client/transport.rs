//! HTTP plumbing shared by the session client and the request executor.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::envelope::parse_body;
use super::error::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Description of one API call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/server-details`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestConfig {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Base URL plus a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct Transport {
    base_url: Url,
    timeout: Duration,
    client: Client,
}

impl Transport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid API URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path {}: {}", path, e)))
    }

    /// Send one request and return the parsed (not yet unwrapped) body.
    ///
    /// Non-2xx answers become `ApiError::Http` / `ApiError::Unauthorized`.
    pub async fn execute(
        &self,
        config: &RequestConfig,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(&config.path)?;
        debug!(method = %config.method, url = %url, "Sending API request");

        let mut request = self
            .client
            .request(config.method.as_reqwest(), url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if !config.query.is_empty() {
            request = request.query(&config.query);
        }
        if let Some(body) = &config.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.timeout))?;

        debug!(url = %url, status = status.as_u16(), "Received API response");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        Ok(parse_body(&text))
    }
}
