pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod session;
pub mod uptime;

#[cfg(test)]
mod test_support;

pub use api::MonitorApi;
pub use client::{ApiClient, ApiError, RequestConfig, RequestExecutor, RequestState, Transport};
pub use session::{Credentials, LoginOutcome, Session, SessionManager};
pub use uptime::{parse_uptime, UptimeRecord};
