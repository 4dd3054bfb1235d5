//! Payload types for the monitoring API.
//!
//! The server reports most numbers as strings (`"12G"`, `"3.5"`, `"42%"`)
//! and is not consistent about it, so textual fields accept strings, numbers
//! and booleans alike. Unknown fields are kept in `extra` where the
//! dashboard shows them as key/value lists.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Deserialize a string, number or bool as `Option<String>`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Deserialize a number or numeric string as `Option<u64>`.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Leading numeric part of values such as `"12G"`, `"42%"` or `"3.5"`.
pub fn parse_measure(value: Option<&str>) -> f64 {
    let Some(value) = value else { return 0.0 };
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0.0)
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// `GET /server-details`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerDetails {
    /// Raw `uptime` command output
    #[serde(default, deserialize_with = "lenient_string")]
    pub uptime: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub docker_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One processor from `GET /server-details/cpu-info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub processor: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vendor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpu_mhz: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cache_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpu_cores: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CpuInfo {
    pub fn mhz(&self) -> f64 {
        parse_measure(self.cpu_mhz.as_deref())
    }
}

/// One mount from `GET /server-details/disk-usage` (`df -h` columns)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub filesystem: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub used: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub available: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub use_percentage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mounted_on: Option<String>,
}

impl DiskUsage {
    pub fn size_gb(&self) -> f64 {
        parse_measure(self.size.as_deref())
    }

    pub fn used_gb(&self) -> f64 {
        parse_measure(self.used.as_deref())
    }

    pub fn available_gb(&self) -> f64 {
        parse_measure(self.available.as_deref())
    }

    pub fn use_percent(&self) -> f64 {
        parse_measure(self.use_percentage.as_deref())
    }
}

/// One row from `GET /server-details/running-processes` (`ps aux` columns)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub process_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpu_consumption: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vsz: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rss: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub started: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessSortKey {
    #[default]
    Cpu,
    Pid,
    Memory,
    User,
    Command,
}

impl ProcessInfo {
    fn fields(&self) -> [Option<&str>; 9] {
        [
            self.user.as_deref(),
            self.process_id.as_deref(),
            self.cpu_consumption.as_deref(),
            self.vsz.as_deref(),
            self.rss.as_deref(),
            self.stat.as_deref(),
            self.started.as_deref(),
            self.time.as_deref(),
            self.command.as_deref(),
        ]
    }

    /// Case-insensitive match against any column
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.fields()
            .iter()
            .any(|field| contains_ignore_case(*field, &term))
    }

    pub fn cpu(&self) -> f64 {
        parse_measure(self.cpu_consumption.as_deref())
    }

    fn compare(&self, other: &Self, key: ProcessSortKey) -> Ordering {
        let numeric = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match key {
            ProcessSortKey::Cpu => numeric(self.cpu(), other.cpu()),
            ProcessSortKey::Pid => numeric(
                parse_measure(self.process_id.as_deref()),
                parse_measure(other.process_id.as_deref()),
            ),
            ProcessSortKey::Memory => numeric(
                parse_measure(self.rss.as_deref()),
                parse_measure(other.rss.as_deref()),
            ),
            ProcessSortKey::User => self.user.cmp(&other.user),
            ProcessSortKey::Command => self.command.cmp(&other.command),
        }
    }
}

/// Filter by `term` (if any) and sort by `key`.
pub fn filter_and_sort_processes(
    processes: Vec<ProcessInfo>,
    term: Option<&str>,
    key: ProcessSortKey,
    descending: bool,
) -> Vec<ProcessInfo> {
    let mut processes: Vec<ProcessInfo> = match term.map(str::trim).filter(|t| !t.is_empty()) {
        Some(term) => processes.into_iter().filter(|p| p.matches(term)).collect(),
        None => processes,
    };

    processes.sort_by(|a, b| {
        let ordering = a.compare(b, key);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    processes
}

/// `GET /docker/images`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerImage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vulnerability: Option<String>,
}

impl DockerImage {
    /// `repository:tag` as accepted by `docker run`
    pub fn reference(&self) -> Option<String> {
        let repository = self.repository.as_deref()?;
        Some(format!(
            "{}:{}",
            repository,
            self.tag.as_deref().unwrap_or("latest")
        ))
    }

    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        contains_ignore_case(self.repository.as_deref(), &term)
            || contains_ignore_case(self.tag.as_deref(), &term)
            || contains_ignore_case(self.image_id.as_deref(), &term)
    }
}

/// `GET /docker/image/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerImageDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub virtual_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub architecture: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub docker_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<Vec<String>>,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub repo_digests: Option<Vec<String>>,
    #[serde(default)]
    pub exposed_ports: Option<Value>,
    #[serde(default)]
    pub volumes: Option<Value>,
    #[serde(default)]
    pub labels: Option<Value>,
    #[serde(default)]
    pub layers: Option<Vec<String>>,
    #[serde(default)]
    pub history: Vec<ImageHistoryEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
    #[serde(default)]
    pub empty_layer: bool,
}

/// `GET /docker/containers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerContainer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ports: Option<String>,
}

impl DockerContainer {
    pub fn is_running(&self) -> bool {
        contains_ignore_case(self.status.as_deref(), "running")
            || self
                .status
                .as_deref()
                .map(|s| s.trim_start().starts_with("Up"))
                .unwrap_or(false)
    }

    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        contains_ignore_case(self.name.as_deref(), &term)
            || contains_ignore_case(self.id.as_deref(), &term)
            || contains_ignore_case(self.image.as_deref(), &term)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: String,
    pub container_port: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeMapping {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

/// Body of `POST /docker/image/run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunImageRequest {
    /// `repository:tag`
    pub image: String,
    pub name: String,
    pub command: Vec<String>,
    pub detached: bool,
    pub environment: BTreeMap<String, String>,
    pub network: String,
    pub ports: Vec<PortMapping>,
    pub restart: String,
    pub volumes: Vec<VolumeMapping>,
}

impl RunImageRequest {
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            command: Vec::new(),
            detached: true,
            environment: BTreeMap::new(),
            network: "bridge".to_string(),
            ports: Vec::new(),
            restart: "no".to_string(),
            volumes: Vec::new(),
        }
    }

    /// Split a command line on whitespace
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.split_whitespace().map(str::to_string).collect();
        self
    }

    /// Drop incomplete port and volume mappings and blank env keys.
    pub fn normalized(mut self) -> Self {
        self.ports
            .retain(|p| !p.host_port.trim().is_empty() && !p.container_port.trim().is_empty());
        self.volumes.retain(|v| {
            !v.host_path.trim().is_empty() && !v.container_path.trim().is_empty()
        });
        self.environment = self
            .environment
            .into_iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| (key.trim().to_string(), value))
            .collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing or search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

/// `GET /filesystem/list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub entries: Vec<FileEntry>,
}

/// Directories first, then everything else, each group by name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        let a_dir = a.kind == EntryKind::Directory;
        let b_dir = b.kind == EntryKind::Directory;
        b_dir
            .cmp(&a_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_measure() {
        assert_eq!(parse_measure(Some("12G")), 12.0);
        assert_eq!(parse_measure(Some("42%")), 42.0);
        assert_eq!(parse_measure(Some(" 3.5 ")), 3.5);
        assert_eq!(parse_measure(Some("n/a")), 0.0);
        assert_eq!(parse_measure(None), 0.0);
    }

    #[test]
    fn test_lenient_fields_accept_numbers() {
        let cpu: CpuInfo = serde_json::from_value(json!({
            "processor": 0,
            "model_name": "AMD EPYC 7B13",
            "cpu_mhz": 2450.5,
            "flags": "fpu vme"
        }))
        .unwrap();

        assert_eq!(cpu.processor.as_deref(), Some("0"));
        assert_eq!(cpu.mhz(), 2450.5);
        assert_eq!(cpu.extra.get("flags"), Some(&json!("fpu vme")));
    }

    #[test]
    fn test_disk_usage_values() {
        let disk: DiskUsage = serde_json::from_value(json!({
            "filesystem": "/dev/sda1",
            "size": "50G",
            "used": "20G",
            "available": "30G",
            "use_percentage": "40%",
            "mounted_on": "/"
        }))
        .unwrap();

        assert_eq!(disk.size_gb(), 50.0);
        assert_eq!(disk.used_gb(), 20.0);
        assert_eq!(disk.available_gb(), 30.0);
        assert_eq!(disk.use_percent(), 40.0);
    }

    fn process(pid: &str, cpu: &str, command: &str) -> ProcessInfo {
        ProcessInfo {
            user: Some("root".to_string()),
            process_id: Some(pid.to_string()),
            cpu_consumption: Some(cpu.to_string()),
            command: Some(command.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_filter_and_sort() {
        let processes = vec![
            process("10", "0.5", "/usr/sbin/sshd"),
            process("200", "12.0", "dockerd"),
            process("3", "2.0", "containerd"),
        ];

        let sorted = filter_and_sort_processes(processes.clone(), None, ProcessSortKey::Cpu, true);
        let pids: Vec<_> = sorted.iter().map(|p| p.process_id.as_deref().unwrap()).collect();
        assert_eq!(pids, vec!["200", "3", "10"]);

        let sorted = filter_and_sort_processes(processes.clone(), None, ProcessSortKey::Pid, false);
        let pids: Vec<_> = sorted.iter().map(|p| p.process_id.as_deref().unwrap()).collect();
        assert_eq!(pids, vec!["3", "10", "200"]);

        let filtered =
            filter_and_sort_processes(processes, Some("DOCKER"), ProcessSortKey::Cpu, true);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].command.as_deref(), Some("dockerd"));
    }

    #[test]
    fn test_image_reference_and_search() {
        let image = DockerImage {
            repository: Some("nginx".to_string()),
            tag: Some("1.25-alpine".to_string()),
            image_id: Some("a1b2c3".to_string()),
            ..Default::default()
        };

        assert_eq!(image.reference().as_deref(), Some("nginx:1.25-alpine"));
        assert!(image.matches("ALPINE"));
        assert!(image.matches("a1b"));
        assert!(!image.matches("redis"));
        assert_eq!(DockerImage::default().reference(), None);
    }

    #[test]
    fn test_container_running_status() {
        let running = DockerContainer {
            status: Some("Up 3 hours".to_string()),
            ..Default::default()
        };
        let exited = DockerContainer {
            status: Some("Exited (0) 2 days ago".to_string()),
            ..Default::default()
        };
        assert!(running.is_running());
        assert!(!exited.is_running());
    }

    #[test]
    fn test_run_request_normalization() {
        let mut request = RunImageRequest::new("nginx:latest", "web").with_command("nginx -g  daemon");
        request.ports = vec![
            PortMapping {
                host_port: "8080".to_string(),
                container_port: "80".to_string(),
                protocol: "tcp".to_string(),
            },
            PortMapping {
                host_port: "".to_string(),
                container_port: "443".to_string(),
                protocol: "tcp".to_string(),
            },
        ];
        request.volumes = vec![VolumeMapping {
            host_path: "/srv".to_string(),
            container_path: " ".to_string(),
            read_only: true,
        }];
        request.environment.insert(" MODE ".to_string(), "prod".to_string());
        request.environment.insert("  ".to_string(), "dropped".to_string());

        let request = request.normalized();
        assert_eq!(request.command, vec!["nginx", "-g", "daemon"]);
        assert_eq!(request.ports.len(), 1);
        assert!(request.volumes.is_empty());
        assert_eq!(request.environment.len(), 1);
        assert_eq!(request.environment.get("MODE").map(String::as_str), Some("prod"));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["network"], "bridge");
        assert_eq!(body["restart"], "no");
        assert_eq!(body["detached"], true);
    }

    #[test]
    fn test_entries_sorted_directories_first() {
        let listing: FileListing = serde_json::from_value(json!({
            "path": "/home",
            "entries": [
                {"name": "b.txt", "path": "/home/b.txt", "type": "file", "size": 10},
                {"name": "Zeta", "path": "/home/Zeta", "type": "directory"},
                {"name": "a.txt", "path": "/home/a.txt", "type": "file"},
                {"name": "alpha", "path": "/home/alpha", "type": "directory"},
                {"name": "link", "path": "/home/link", "type": "symlink"},
                {"name": "sock", "path": "/home/sock", "type": "socket"}
            ]
        }))
        .unwrap();

        let mut entries = listing.entries;
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "a.txt", "b.txt", "link", "sock"]);
        assert_eq!(entries.last().unwrap().kind, EntryKind::Other);
    }
}
