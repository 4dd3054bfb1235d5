//! Stateful wrapper around one logical API data need.
//!
//! A `RequestExecutor` remembers the outcome of its most recent call
//! (`data`, `error`, `loading`) and publishes every change on a watch
//! channel. Calls are not de-duplicated or cancelled: when two overlap, the
//! one that settles last decides the stored state.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::ApiError;
use super::transport::RequestConfig;
use super::ApiClient;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestState {
    /// Last successfully unwrapped payload
    pub data: Option<Value>,
    /// Last failure
    pub error: Option<ApiError>,
    pub loading: bool,
}

pub struct RequestExecutor {
    client: ApiClient,
    state: Arc<watch::Sender<RequestState>>,
}

impl RequestExecutor {
    pub fn new(client: ApiClient) -> Self {
        let (state, _) = watch::channel(RequestState::default());
        Self {
            client,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Value> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    /// Issue one request and record its outcome.
    ///
    /// The outcome is both stored and returned. A 401 has already cleared
    /// the session by the time the error is stored.
    pub async fn request(&self, config: RequestConfig) -> Result<Value, ApiError> {
        begin(&self.state);
        let result = self.client.send(&config).await;
        settle(&self.state, &result);
        result
    }

    /// Like `request`, deserializing the unwrapped payload into `T`.
    ///
    /// The raw payload is still stored as `data`; a payload that does not
    /// fit `T` is also stored as `error`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<T, ApiError> {
        let path = config.path.clone();
        let value = self.request(config).await?;
        serde_json::from_value(value).map_err(|e| {
            let err = ApiError::Shape(format!("unexpected payload from {}: {}", path, e));
            self.state.send_modify(|state| state.error = Some(err.clone()));
            err
        })
    }

    /// Run a request on a background task.
    ///
    /// The task only holds a weak reference to this executor's state; if
    /// the executor is dropped before the response arrives, the result is
    /// discarded.
    pub fn spawn(&self, config: RequestConfig) -> JoinHandle<()> {
        begin(&self.state);

        let client = self.client.clone();
        let state = Arc::downgrade(&self.state);

        tokio::spawn(async move {
            let result = client.send(&config).await;
            match state.upgrade() {
                Some(state) => settle(&state, &result),
                None => debug!(path = %config.path, "Executor dropped; discarding response"),
            }
        })
    }
}

fn begin(state: &watch::Sender<RequestState>) {
    state.send_modify(|state| {
        state.loading = true;
        state.error = None;
    });
}

fn settle(state: &watch::Sender<RequestState>, result: &Result<Value, ApiError>) {
    state.send_modify(|state| {
        state.loading = false;
        match result {
            Ok(value) => {
                state.data = Some(value.clone());
                state.error = None;
            }
            Err(err) => state.error = Some(err.clone()),
        }
    });
}
