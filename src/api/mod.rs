//! Typed access to the monitoring API endpoints.
//!
//! Every call goes through a `RequestExecutor`, so authentication, envelope
//! unwrapping and 401 handling behave the same everywhere.

pub mod models;

pub use models::*;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::client::{ApiClient, ApiError, RequestConfig};
use crate::uptime::{parse_uptime, UptimeRecord};

pub const SERVER_DETAILS: &str = "/server-details";
const CPU_INFO: &str = "/server-details/cpu-info";
const DISK_USAGE: &str = "/server-details/disk-usage";
const RUNNING_PROCESSES: &str = "/server-details/running-processes";
const LIBRARIES: &str = "/server-details/libraries";
const DOCKER_IMAGES: &str = "/docker/images";
const DOCKER_CONTAINERS: &str = "/docker/containers";
const DOCKER_RUN_IMAGE: &str = "/docker/image/run";
const FILESYSTEM_LIST: &str = "/filesystem/list";
const FILESYSTEM_DETAILS: &str = "/filesystem/details";
const FILESYSTEM_SEARCH: &str = "/filesystem/search";

/// Depth used by the dashboard's file search
pub const DEFAULT_SEARCH_DEPTH: u32 = 5;

#[derive(Clone)]
pub struct MonitorApi {
    client: ApiClient,
}

impl MonitorApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn fetch<T: DeserializeOwned>(&self, config: RequestConfig) -> Result<T, ApiError> {
        self.client.executor().request_as(config).await
    }

    /// Fetch a list payload.
    ///
    /// Anything that is not an array (`null`, `{"success": true, "data": null}`,
    /// a bare status message) counts as an empty list.
    async fn fetch_list<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<Vec<T>, ApiError> {
        let value: Value = self.fetch(config.clone()).await?;
        match value {
            Value::Array(_) => serde_json::from_value(value).map_err(|e| {
                ApiError::Shape(format!("unexpected list item from {}: {}", config.path, e))
            }),
            Value::Null => Ok(Vec::new()),
            Value::Object(ref map) if map.get("data").is_some_and(Value::is_null) => {
                Ok(Vec::new())
            }
            other => {
                warn!(path = %config.path, payload = %other, "Expected a list; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn server_details(&self) -> Result<ServerDetails, ApiError> {
        self.fetch(RequestConfig::get(SERVER_DETAILS)).await
    }

    /// Server details with the `uptime` line parsed
    pub async fn uptime(&self) -> Result<UptimeRecord, ApiError> {
        let details = self.server_details().await?;
        Ok(parse_uptime(details.uptime.as_deref()))
    }

    pub async fn cpu_info(&self) -> Result<Vec<CpuInfo>, ApiError> {
        self.fetch_list(RequestConfig::get(CPU_INFO)).await
    }

    pub async fn disk_usage(&self) -> Result<Vec<DiskUsage>, ApiError> {
        self.fetch_list(RequestConfig::get(DISK_USAGE)).await
    }

    pub async fn running_processes(&self) -> Result<Vec<ProcessInfo>, ApiError> {
        self.fetch_list(RequestConfig::get(RUNNING_PROCESSES)).await
    }

    pub async fn libraries(&self) -> Result<Value, ApiError> {
        self.fetch(RequestConfig::get(LIBRARIES)).await
    }

    pub async fn docker_images(&self) -> Result<Vec<DockerImage>, ApiError> {
        self.fetch_list(RequestConfig::get(DOCKER_IMAGES)).await
    }

    pub async fn docker_image(&self, id: &str) -> Result<DockerImageDetails, ApiError> {
        self.fetch(RequestConfig::get(image_path(id)?)).await
    }

    pub async fn delete_docker_image(&self, id: &str) -> Result<Value, ApiError> {
        self.fetch(RequestConfig::delete(image_path(id)?)).await
    }

    /// Start a container. Incomplete port/volume mappings are dropped first.
    pub async fn run_docker_image(&self, request: RunImageRequest) -> Result<Value, ApiError> {
        let request = request.normalized();
        if request.name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("container name is required".to_string()));
        }
        let body = serde_json::to_value(&request)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.fetch(RequestConfig::post(DOCKER_RUN_IMAGE, body)).await
    }

    pub async fn docker_containers(&self) -> Result<Vec<DockerContainer>, ApiError> {
        self.fetch_list(RequestConfig::get(DOCKER_CONTAINERS)).await
    }

    /// Directory listing, directories first
    pub async fn list_files(&self, path: &str, include_hidden: bool) -> Result<FileListing, ApiError> {
        let config = RequestConfig::get(FILESYSTEM_LIST)
            .with_query("path", path)
            .with_query("include_hidden", include_hidden);

        let value: Value = self.fetch(config).await?;
        let mut listing: FileListing = if value.is_null() {
            FileListing::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| ApiError::Shape(format!("unexpected file listing: {}", e)))?
        };

        sort_entries(&mut listing.entries);
        Ok(listing)
    }

    pub async fn file_details(&self, path: &str) -> Result<Map<String, Value>, ApiError> {
        let config = RequestConfig::get(FILESYSTEM_DETAILS).with_query("path", path);
        match self.fetch::<Value>(config).await? {
            Value::Object(details) => Ok(details),
            Value::Null => Ok(Map::new()),
            other => Err(ApiError::Shape(format!(
                "expected file details object, got {}",
                other
            ))),
        }
    }

    /// Search below `path`. Accepts a bare list or `{results|entries: [..]}`.
    pub async fn search_files(
        &self,
        path: &str,
        pattern: &str,
        max_depth: u32,
    ) -> Result<Vec<FileEntry>, ApiError> {
        let config = RequestConfig::get(FILESYSTEM_SEARCH)
            .with_query("path", path)
            .with_query("pattern", pattern)
            .with_query("max_depth", max_depth);

        let value: Value = self.fetch(config).await?;
        let results = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Array(_) => value,
            Value::Object(mut map) => map
                .remove("results")
                .or_else(|| map.remove("entries"))
                .unwrap_or(Value::Array(Vec::new())),
            other => other,
        };

        serde_json::from_value(results)
            .map_err(|e| ApiError::Shape(format!("unexpected search results: {}", e)))
    }
}

fn image_path(id: &str) -> Result<String, ApiError> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return Err(ApiError::InvalidRequest(format!("invalid image id: {:?}", id)));
    }
    Ok(format!("/docker/image/{}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Transport;
    use crate::session::{MemoryTokenStore, SessionManager};
    use crate::test_support::TestServer;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn router() -> Router {
        Router::new()
            .route(
                "/server-details",
                get(|| async {
                    Json(json!({
                        "success": true,
                        "data": {
                            "uptime": "14:32:10 up 3 days, 2 users, load average: 0.10, 0.25, 0.30",
                            "os": "Ubuntu 22.04",
                            "docker_version": "24.0.7",
                            "hostname": "web-1"
                        }
                    }))
                }),
            )
            .route(
                "/server-details/disk-usage",
                get(|| async {
                    Json(json!([{"filesystem": "/dev/sda1", "size": "50G", "use_percentage": "40%", "mounted_on": "/"}]))
                }),
            )
            .route(
                "/server-details/cpu-info",
                get(|| async { Json(json!({"success": true, "data": null})) }),
            )
            .route(
                "/server-details/running-processes",
                get(|| async { Json(json!({"success": true, "message": "no processes"})) }),
            )
            .route(
                "/docker/images",
                get(|| async { Json(json!([{"repository": "nginx", "tag": 7}, "oops"])) }),
            )
            .route(
                "/docker/image/:id",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"data": {"id": id, "size": 1024, "cmd": ["nginx"], "history": []}}))
                })
                .delete(|Path(id): Path<String>| async move {
                    Json(json!({"message": format!("deleted {}", id)}))
                }),
            )
            .route(
                "/docker/image/run",
                post(|Json(body): Json<Value>| async move { Json(json!({"data": body})) }),
            )
            .route(
                "/docker/containers",
                get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"message": "expired"}))) }),
            )
            .route(
                "/filesystem/list",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "path": params.get("path"),
                        "include_hidden": params.get("include_hidden"),
                        "entries": [
                            {"name": "notes.txt", "path": "/srv/notes.txt", "type": "file", "size": "12"},
                            {"name": "app", "path": "/srv/app", "type": "directory"}
                        ]
                    }))
                }),
            )
            .route(
                "/filesystem/search",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let depth = params.get("max_depth").cloned().unwrap_or_default();
                    Json(json!({
                        "results": [
                            {"name": depth, "path": params.get("pattern"), "type": "file"}
                        ]
                    }))
                }),
            )
            .route(
                "/filesystem/details",
                get(|| async { Json(json!({"data": {"permissions": "rw-r--r--", "owner": "root"}})) }),
            )
    }

    async fn setup() -> (TestServer, MonitorApi, Arc<SessionManager>) {
        let server = TestServer::start(router()).await;
        let transport = Transport::new(&server.url(), Duration::from_secs(5)).unwrap();
        let session = Arc::new(SessionManager::initialize(
            transport,
            MemoryTokenStore::with_value("tok"),
        ));
        let api = MonitorApi::new(ApiClient::new(session.clone()));
        (server, api, session)
    }

    #[tokio::test]
    async fn test_server_details_and_uptime() {
        let (_server, api, _) = setup().await;

        let details = api.server_details().await.unwrap();
        assert_eq!(details.os.as_deref(), Some("Ubuntu 22.04"));
        assert_eq!(details.extra.get("hostname"), Some(&json!("web-1")));

        let uptime = api.uptime().await.unwrap();
        assert_eq!(uptime.server_time, "14:32:10");
        assert_eq!(uptime.active_users, 2);
        assert_eq!(uptime.load_averages, vec![0.10, 0.25, 0.30]);
    }

    #[tokio::test]
    async fn test_lists() {
        let (_server, api, _) = setup().await;

        let disks = api.disk_usage().await.unwrap();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].use_percent(), 40.0);

        // `{"success": true, "data": null}` is passed on whole but still means "nothing"
        assert!(api.cpu_info().await.unwrap().is_empty());
        // so does a status message without any list
        assert!(api.running_processes().await.unwrap().is_empty());
        // a real list with a malformed item is still an error
        assert!(matches!(api.docker_images().await, Err(ApiError::Shape(_))));
    }

    #[tokio::test]
    async fn test_docker_image_calls() {
        let (_server, api, _) = setup().await;

        let details = api.docker_image("sha256abc").await.unwrap();
        assert_eq!(details.id.as_deref(), Some("sha256abc"));
        assert_eq!(details.size, Some(1024));
        assert_eq!(details.cmd, Some(vec!["nginx".to_string()]));

        let deleted = api.delete_docker_image("sha256abc").await.unwrap();
        assert_eq!(deleted["message"], "deleted sha256abc");

        assert!(matches!(
            api.docker_image("  ").await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_run_image_posts_normalized_body() {
        let (_server, api, _) = setup().await;

        let mut request = RunImageRequest::new("nginx:latest", "web");
        request.ports.push(PortMapping {
            host_port: "8080".to_string(),
            container_port: String::new(),
            protocol: "tcp".to_string(),
        });

        let echoed = api.run_docker_image(request).await.unwrap();
        assert_eq!(echoed["image"], "nginx:latest");
        assert_eq!(echoed["name"], "web");
        assert_eq!(echoed["ports"], json!([]));

        let unnamed = RunImageRequest::new("nginx:latest", " ");
        assert!(matches!(
            api.run_docker_image(unnamed).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_endpoint_logs_out() {
        let (_server, api, session) = setup().await;
        assert!(session.is_authenticated());

        let err = api.docker_containers().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_filesystem_calls() {
        let (_server, api, _) = setup().await;

        let listing = api.list_files("/srv", true).await.unwrap();
        assert_eq!(listing.path.as_deref(), Some("/srv"));
        assert_eq!(listing.entries[0].name, "app");
        assert_eq!(listing.entries[1].size, Some(12));

        let results = api.search_files("/srv", "*.log", DEFAULT_SEARCH_DEPTH).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "5");
        assert_eq!(results[0].path, "*.log");

        let details = api.file_details("/srv/notes.txt").await.unwrap();
        assert_eq!(details.get("owner"), Some(&json!("root")));
    }
}
