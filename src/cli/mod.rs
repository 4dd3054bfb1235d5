//! Command-line interface for the Cerberus monitoring client.
//!
//! Subcommands:
//! - `login` / `logout` / `whoami` - Manage the stored session
//! - `status` - Server details and parsed uptime
//! - `cpu`, `disk`, `processes`, `libraries` - Host inspection
//! - `docker ...` - Images and containers
//! - `fs ...` - Browse and search the remote filesystem

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{
    filter_and_sort_processes, DockerContainer, DockerImage, EntryKind, FileEntry, MonitorApi,
    PortMapping, ProcessSortKey, RunImageRequest, ServerDetails, VolumeMapping,
    DEFAULT_SEARCH_DEPTH, SERVER_DETAILS,
};
use crate::client::{ApiClient, RequestConfig, Transport};
use crate::config::Config;
use crate::session::{Credentials, FileTokenStore, LoginOutcome, SessionManager};
use crate::uptime::{parse_uptime, UptimeRecord, LOAD_AVERAGE_LABELS};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "cerberus")]
#[command(author, version, about = "Client for the Cerberus server monitoring API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cerberus.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to (overrides api.base_url)
    #[arg(long, env = "CERBERUS_API_URL")]
    pub api_url: Option<String>,

    /// File holding the session token (overrides session.token_file)
    #[arg(long, env = "CERBERUS_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Print the raw response payload as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to a monitored server
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "CERBERUS_PASSWORD", hide_env_values = true)]
        password: String,
        /// IPv4 address of the monitored server
        #[arg(long)]
        host: String,
        /// SSH port of the monitored server
        #[arg(long, default_value = "22")]
        port: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the current session
    Whoami,

    /// Show server details and uptime
    Status {
        /// Refresh every N seconds until interrupted
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Show CPU information
    Cpu,

    /// Show disk usage
    Disk,

    /// List running processes
    Processes {
        /// Only show processes matching this text
        #[arg(short, long)]
        filter: Option<String>,
        #[arg(short, long, value_enum, default_value_t = SortArg::Cpu)]
        sort: SortArg,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Maximum number of rows
        #[arg(short = 'n', long, default_value = "25")]
        limit: usize,
    },

    /// List installed libraries
    Libraries,

    /// Docker images and containers
    #[command(subcommand)]
    Docker(DockerCommands),

    /// Remote filesystem
    #[command(subcommand)]
    Fs(FsCommands),
}

/// Docker subcommands
#[derive(Subcommand, Debug)]
pub enum DockerCommands {
    /// List images
    Images {
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// List containers
    Containers {
        #[arg(short, long)]
        filter: Option<String>,
        /// Only running containers
        #[arg(long)]
        running: bool,
    },
    /// Show image details
    Image { id: String },
    /// Delete an image
    Rm { id: String },
    /// Run a container from an image
    Run {
        image: String,
        #[arg(long)]
        name: String,
        /// Command to run instead of the image default
        #[arg(long)]
        command: Option<String>,
        /// Environment variable, KEY=VALUE
        #[arg(short, long = "env")]
        env: Vec<String>,
        /// Port mapping, HOST:CONTAINER[/PROTOCOL]
        #[arg(short, long = "publish")]
        publish: Vec<String>,
        /// Volume mapping, HOST:CONTAINER[:ro]
        #[arg(short, long = "volume")]
        volume: Vec<String>,
        #[arg(long, default_value = "bridge")]
        network: String,
        #[arg(long, default_value = "no")]
        restart: String,
        /// Run in the foreground
        #[arg(long)]
        attach: bool,
    },
}

/// Filesystem subcommands
#[derive(Subcommand, Debug)]
pub enum FsCommands {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Include hidden entries
        #[arg(short, long)]
        all: bool,
    },
    /// Show details for a file or directory
    Details { path: String },
    /// Search for files by name pattern
    Search {
        pattern: String,
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_DEPTH)]
        max_depth: u32,
    },
}

impl Commands {
    /// Session commands work without a stored token; everything else needs one.
    pub fn requires_login(&self) -> bool {
        !matches!(self, Commands::Login { .. } | Commands::Logout | Commands::Whoami)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Cpu,
    Pid,
    Memory,
    User,
    Command,
}

impl From<SortArg> for ProcessSortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Cpu => ProcessSortKey::Cpu,
            SortArg::Pid => ProcessSortKey::Pid,
            SortArg::Memory => ProcessSortKey::Memory,
            SortArg::User => ProcessSortKey::User,
            SortArg::Command => ProcessSortKey::Command,
        }
    }
}

/// Everything a command handler needs
struct CliContext {
    session: Arc<SessionManager>,
    api: MonitorApi,
    json: bool,
}

impl CliContext {
    fn new(cli: &Cli, config: &Config) -> Result<Self> {
        let base_url = cli.api_url.as_deref().unwrap_or(&config.api.base_url);
        let token_file = cli
            .token_file
            .clone()
            .unwrap_or_else(|| config.session.token_file.clone());

        let transport = Transport::new(base_url, config.api.timeout())
            .with_context(|| format!("Invalid API URL: {}", base_url))?;
        let session = Arc::new(SessionManager::initialize(
            transport,
            FileTokenStore::new(token_file),
        ));
        let api = MonitorApi::new(ApiClient::new(session.clone()));

        Ok(Self {
            session,
            api,
            json: cli.json,
        })
    }

    fn base_url(&self) -> &str {
        self.session.transport().base_url().as_str()
    }

    fn require_login(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            bail!("Not logged in. Run `cerberus login` first.");
        }
        Ok(())
    }
}

/// Run the CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    let ctx = CliContext::new(cli, config)?;

    if cli.command.requires_login() {
        ctx.require_login()?;
    }

    match &cli.command {
        Commands::Login {
            username,
            password,
            host,
            port,
        } => cmd_login(&ctx, username, password, host, port).await,
        Commands::Logout => cmd_logout(&ctx).await,
        Commands::Whoami => cmd_whoami(&ctx),
        Commands::Status { watch: Some(every) } => cmd_status_watch(&ctx, *every).await,
        Commands::Status { watch: None } => cmd_status(&ctx).await,
        Commands::Cpu => cmd_cpu(&ctx).await,
        Commands::Disk => cmd_disk(&ctx).await,
        Commands::Processes {
            filter,
            sort,
            asc,
            limit,
        } => cmd_processes(&ctx, filter.as_deref(), *sort, *asc, *limit).await,
        Commands::Libraries => cmd_libraries(&ctx).await,
        Commands::Docker(docker) => run_docker(&ctx, docker).await,
        Commands::Fs(fs) => run_fs(&ctx, fs).await,
    }
}

async fn run_docker(ctx: &CliContext, command: &DockerCommands) -> Result<()> {
    match command {
        DockerCommands::Images { filter } => cmd_docker_images(ctx, filter.as_deref()).await,
        DockerCommands::Containers { filter, running } => {
            cmd_docker_containers(ctx, filter.as_deref(), *running).await
        }
        DockerCommands::Image { id } => cmd_docker_image(ctx, id).await,
        DockerCommands::Rm { id } => cmd_docker_rm(ctx, id).await,
        DockerCommands::Run {
            image,
            name,
            command,
            env,
            publish,
            volume,
            network,
            restart,
            attach,
        } => {
            let mut request = RunImageRequest::new(image.as_str(), name.as_str());
            if let Some(command) = command {
                request = request.with_command(command);
            }
            for entry in env {
                let (key, value) = parse_env(entry)?;
                request.environment.insert(key, value);
            }
            for entry in publish {
                request.ports.push(parse_port(entry)?);
            }
            for entry in volume {
                request.volumes.push(parse_volume(entry)?);
            }
            request.network = network.clone();
            request.restart = restart.clone();
            request.detached = !attach;

            cmd_docker_run(ctx, request).await
        }
    }
}

async fn run_fs(ctx: &CliContext, command: &FsCommands) -> Result<()> {
    match command {
        FsCommands::Ls { path, all } => cmd_fs_ls(ctx, path, *all).await,
        FsCommands::Details { path } => cmd_fs_details(ctx, path).await,
        FsCommands::Search {
            pattern,
            path,
            max_depth,
        } => cmd_fs_search(ctx, path, pattern, *max_depth).await,
    }
}

// ============================================================================
// Session Commands
// ============================================================================

async fn cmd_login(
    ctx: &CliContext,
    username: &str,
    password: &str,
    host: &str,
    port: &str,
) -> Result<()> {
    let port = validate_login(username, host, port)?;

    let credentials = Credentials {
        username: username.to_string(),
        password: password.to_string(),
        host: host.to_string(),
        port: port.to_string(),
    };

    println!("Logging in to {} as {}...", ctx.base_url(), username);

    match ctx.session.login(&credentials).await {
        LoginOutcome::Success { user } => {
            println!("[OK] Logged in as {}", user.username);
            if let Some(preview) = ctx.session.snapshot().token_preview() {
                println!("     Token: {}", preview);
            }
            Ok(())
        }
        LoginOutcome::Failure { error } => {
            println!("[!!] {}", error);
            bail!("Login failed");
        }
    }
}

/// Check login input the way the login form does. Returns the port.
fn validate_login(username: &str, host: &str, port: &str) -> Result<u16> {
    if username.trim().is_empty() {
        bail!("Username is required");
    }
    if host.trim().parse::<Ipv4Addr>().is_err() {
        bail!("Invalid IP address: {}", host);
    }
    match port.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => bail!("Port must be a number between 1 and 65535"),
    }
}

async fn cmd_logout(ctx: &CliContext) -> Result<()> {
    if !ctx.session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    if let Some(remote) = ctx.session.logout() {
        // local state is already gone; only wait for the server notification
        let _ = remote.await;
    }
    println!("[OK] Logged out");
    Ok(())
}

fn cmd_whoami(ctx: &CliContext) -> Result<()> {
    let session = ctx.session.snapshot();

    if ctx.json {
        return print_json(&serde_json::json!({
            "authenticated": session.is_authenticated(),
            "api_url": ctx.base_url(),
            "token": session.token_preview(),
        }));
    }

    match session.token_preview() {
        Some(preview) => {
            println!("[OK] Logged in");
            println!("API:    {}", ctx.base_url());
            println!("Token:  {}", preview);
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

// ============================================================================
// Server Commands
// ============================================================================

async fn cmd_status(ctx: &CliContext) -> Result<()> {
    let details = ctx
        .api
        .server_details()
        .await
        .context("Failed to fetch server details")?;
    let uptime = parse_uptime(details.uptime.as_deref());

    if ctx.json {
        return print_json(&serde_json::json!({ "details": details, "uptime": uptime }));
    }

    println!();
    println!("=== Server Status ===");
    println!();
    println!("API:        {}", ctx.base_url());
    println!("OS:         {}", details.os.as_deref().unwrap_or("-"));
    println!("Docker:     {}", details.docker_version.as_deref().unwrap_or("-"));
    print_uptime(&uptime);

    if !details.extra.is_empty() {
        println!();
        println!("Details:");
        print_map(&details.extra, 2);
    }
    println!();
    Ok(())
}

fn print_uptime(uptime: &UptimeRecord) {
    println!("Time:       {}", or_dash(&uptime.server_time));
    println!("Uptime:     {}", or_dash(&uptime.uptime));
    println!("Users:      {}", uptime.active_users);
    println!("Load:       {}", format_load(&uptime.load_averages));
}

fn format_load(load_averages: &[f64]) -> String {
    if load_averages.is_empty() {
        return "-".to_string();
    }
    load_averages
        .iter()
        .zip(LOAD_AVERAGE_LABELS)
        .map(|(value, label)| format!("{:.2} ({})", value, label))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Poll server details with one executor until Ctrl+C or the session ends.
async fn cmd_status_watch(ctx: &CliContext, every: u64) -> Result<()> {
    let executor = ctx.api.client().executor();
    let mut updates = executor.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));

    println!("Watching {} every {}s (Ctrl+C to stop)", ctx.base_url(), every.max(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                executor.spawn(RequestConfig::get(SERVER_DETAILS));
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                if let Some(err) = state.error {
                    println!("[!!] {}", err);
                    if err.is_unauthorized() {
                        bail!("Session expired. Run `cerberus login` again.");
                    }
                    continue;
                }
                let details: ServerDetails = state
                    .data
                    .map(serde_json::from_value)
                    .transpose()
                    .context("Unexpected server details payload")?
                    .unwrap_or_default();
                let uptime = parse_uptime(details.uptime.as_deref());
                println!(
                    "{}  up {}  users: {}  load: {}",
                    or_dash(&uptime.server_time),
                    or_dash(&uptime.uptime),
                    uptime.active_users,
                    format_load(&uptime.load_averages)
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted; stopping watch");
                break;
            }
        }
    }

    Ok(())
}

async fn cmd_cpu(ctx: &CliContext) -> Result<()> {
    let cpus = ctx.api.cpu_info().await.context("Failed to fetch CPU info")?;
    if ctx.json {
        return print_json(&cpus);
    }

    if cpus.is_empty() {
        println!("No CPU information reported.");
        return Ok(());
    }

    println!();
    println!(
        "{:<6} {:<14} {:<40} {:>10} {:>10} {:>6}",
        "CPU", "VENDOR", "MODEL", "MHZ", "CACHE", "CORES"
    );
    println!("{}", "-".repeat(91));
    for cpu in &cpus {
        println!(
            "{:<6} {:<14} {:<40} {:>10.1} {:>10} {:>6}",
            cpu.processor.as_deref().unwrap_or("-"),
            truncate(cpu.vendor_id.as_deref().unwrap_or("-"), 14),
            truncate(cpu.model_name.as_deref().unwrap_or("-"), 40),
            cpu.mhz(),
            cpu.cache_size.as_deref().unwrap_or("-"),
            cpu.cpu_cores.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("Total: {} processor(s)", cpus.len());
    Ok(())
}

async fn cmd_disk(ctx: &CliContext) -> Result<()> {
    let disks = ctx.api.disk_usage().await.context("Failed to fetch disk usage")?;
    if ctx.json {
        return print_json(&disks);
    }

    if disks.is_empty() {
        println!("No filesystems reported.");
        return Ok(());
    }

    println!();
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>6}  {}",
        "FILESYSTEM", "SIZE", "USED", "AVAIL", "USE%", "MOUNTED ON"
    );
    println!("{}", "-".repeat(80));
    for disk in &disks {
        let icon = if disk.use_percent() >= 90.0 { "[!!]" } else { "" };
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>6}  {} {}",
            truncate(disk.filesystem.as_deref().unwrap_or("-"), 24),
            disk.size.as_deref().unwrap_or("-"),
            disk.used.as_deref().unwrap_or("-"),
            disk.available.as_deref().unwrap_or("-"),
            disk.use_percentage.as_deref().unwrap_or("-"),
            disk.mounted_on.as_deref().unwrap_or("-"),
            icon,
        );
    }
    println!();
    Ok(())
}

async fn cmd_processes(
    ctx: &CliContext,
    filter: Option<&str>,
    sort: SortArg,
    ascending: bool,
    limit: usize,
) -> Result<()> {
    let processes = ctx
        .api
        .running_processes()
        .await
        .context("Failed to fetch running processes")?;
    let total = processes.len();
    let processes = filter_and_sort_processes(processes, filter, sort.into(), !ascending);

    if ctx.json {
        return print_json(&processes);
    }

    if processes.is_empty() {
        println!("No matching processes.");
        return Ok(());
    }

    println!();
    println!(
        "{:>8} {:<12} {:>6} {:>10} {:<6} {:>10}  {}",
        "PID", "USER", "CPU%", "RSS", "STAT", "TIME", "COMMAND"
    );
    println!("{}", "-".repeat(100));
    for process in processes.iter().take(limit) {
        println!(
            "{:>8} {:<12} {:>6.1} {:>10} {:<6} {:>10}  {}",
            process.process_id.as_deref().unwrap_or("-"),
            truncate(process.user.as_deref().unwrap_or("-"), 12),
            process.cpu(),
            process.rss.as_deref().unwrap_or("-"),
            process.stat.as_deref().unwrap_or("-"),
            process.time.as_deref().unwrap_or("-"),
            truncate(process.command.as_deref().unwrap_or("-"), 40),
        );
    }
    println!();
    println!(
        "Showing {} of {} matching ({} total)",
        processes.len().min(limit),
        processes.len(),
        total
    );
    Ok(())
}

async fn cmd_libraries(ctx: &CliContext) -> Result<()> {
    let libraries = ctx.api.libraries().await.context("Failed to fetch libraries")?;
    if ctx.json {
        return print_json(&libraries);
    }

    match &libraries {
        Value::Object(map) if !map.is_empty() => print_map(map, 0),
        Value::Array(items) if !items.is_empty() => {
            for item in items {
                println!("  {}", display_value(item));
            }
        }
        _ => println!("No libraries reported."),
    }
    Ok(())
}

// ============================================================================
// Docker Commands
// ============================================================================

async fn cmd_docker_images(ctx: &CliContext, filter: Option<&str>) -> Result<()> {
    let images = ctx
        .api
        .docker_images()
        .await
        .context("Failed to fetch docker images")?;
    let images: Vec<DockerImage> = match filter {
        Some(term) => images.into_iter().filter(|i| i.matches(term)).collect(),
        None => images,
    };

    if ctx.json {
        return print_json(&images);
    }

    if images.is_empty() {
        println!("No images found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36} {:<16} {:<14} {:<20} {:>10}",
        "REPOSITORY", "TAG", "IMAGE ID", "CREATED", "SIZE"
    );
    println!("{}", "-".repeat(100));
    for image in &images {
        println!(
            "{:<36} {:<16} {:<14} {:<20} {:>10}",
            truncate(image.repository.as_deref().unwrap_or("<none>"), 36),
            truncate(image.tag.as_deref().unwrap_or("<none>"), 16),
            truncate(image.image_id.as_deref().unwrap_or("-"), 14),
            truncate(image.created.as_deref().unwrap_or("-"), 20),
            image.size.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("Total: {} image(s)", images.len());
    Ok(())
}

async fn cmd_docker_containers(
    ctx: &CliContext,
    filter: Option<&str>,
    running_only: bool,
) -> Result<()> {
    let containers = ctx
        .api
        .docker_containers()
        .await
        .context("Failed to fetch docker containers")?;
    let containers: Vec<DockerContainer> = containers
        .into_iter()
        .filter(|c| !running_only || c.is_running())
        .filter(|c| filter.map(|term| c.matches(term)).unwrap_or(true))
        .collect();

    if ctx.json {
        return print_json(&containers);
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!();
    println!(
        "     {:<14} {:<24} {:<30} {:<22} {}",
        "ID", "NAME", "IMAGE", "STATUS", "PORTS"
    );
    println!("{}", "-".repeat(110));
    for container in &containers {
        let icon = if container.is_running() { "[OK]" } else { "[--]" };
        println!(
            "{} {:<14} {:<24} {:<30} {:<22} {}",
            icon,
            truncate(container.id.as_deref().unwrap_or("-"), 14),
            truncate(container.name.as_deref().unwrap_or("-"), 24),
            truncate(container.image.as_deref().unwrap_or("-"), 30),
            truncate(container.status.as_deref().unwrap_or("-"), 22),
            container.ports.as_deref().unwrap_or(""),
        );
    }
    println!();
    let running = containers.iter().filter(|c| c.is_running()).count();
    println!("Total: {} container(s), {} running", containers.len(), running);
    Ok(())
}

async fn cmd_docker_image(ctx: &CliContext, id: &str) -> Result<()> {
    let image = ctx
        .api
        .docker_image(id)
        .await
        .with_context(|| format!("Failed to fetch image {}", id))?;

    if ctx.json {
        return print_json(&image);
    }

    println!();
    println!("=== Image: {} ===", image.id.as_deref().unwrap_or(id));
    println!();
    print_list("Tags:", image.repo_tags.as_deref());
    println!("Created:      {}", image.created.as_deref().unwrap_or("-"));
    println!("Author:       {}", image.author.as_deref().unwrap_or("-"));
    println!(
        "Size:         {}",
        image.size.map(format_bytes).unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Platform:     {}/{}",
        image.os.as_deref().unwrap_or("?"),
        image.architecture.as_deref().unwrap_or("?")
    );
    println!("Docker:       {}", image.docker_version.as_deref().unwrap_or("-"));
    println!("Workdir:      {}", image.working_dir.as_deref().unwrap_or("-"));
    if let Some(entrypoint) = &image.entrypoint {
        println!("Entrypoint:   {}", entrypoint.join(" "));
    }
    if let Some(cmd) = &image.cmd {
        println!("Cmd:          {}", cmd.join(" "));
    }
    print_list("Env:", image.env.as_deref());
    print_list("Digests:", image.repo_digests.as_deref());
    if let Some(Value::Object(ports)) = &image.exposed_ports {
        let ports: Vec<String> = ports.keys().cloned().collect();
        print_list("Ports:", Some(ports.as_slice()));
    }
    if let Some(Value::Object(labels)) = &image.labels {
        if !labels.is_empty() {
            println!("Labels:");
            print_map(labels, 2);
        }
    }
    if let Some(layers) = &image.layers {
        println!("Layers:       {}", layers.len());
    }

    if !image.history.is_empty() {
        println!();
        println!("History:");
        for entry in &image.history {
            let marker = if entry.empty_layer { "   " } else { "[L]" };
            println!(
                "  {} {:<22} {}",
                marker,
                truncate(entry.created.as_deref().unwrap_or("-"), 22),
                truncate(entry.created_by.as_deref().unwrap_or(""), 80),
            );
        }
    }
    println!();
    Ok(())
}

async fn cmd_docker_rm(ctx: &CliContext, id: &str) -> Result<()> {
    let response = ctx
        .api
        .delete_docker_image(id)
        .await
        .with_context(|| format!("Failed to delete image {}", id))?;

    if ctx.json {
        return print_json(&response);
    }

    println!("[OK] Deleted image {}", id);
    if let Some(message) = response.get("message").and_then(Value::as_str) {
        println!("     {}", message);
    }
    Ok(())
}

async fn cmd_docker_run(ctx: &CliContext, request: RunImageRequest) -> Result<()> {
    println!("Starting {} from {}...", request.name, request.image);

    let response = ctx
        .api
        .run_docker_image(request)
        .await
        .context("Failed to run image")?;

    if ctx.json {
        return print_json(&response);
    }

    println!("[OK] Container started");
    match &response {
        Value::Object(map) if !map.is_empty() => print_map(map, 5),
        Value::String(message) => println!("     {}", message),
        _ => {}
    }
    Ok(())
}

// ============================================================================
// Filesystem Commands
// ============================================================================

async fn cmd_fs_ls(ctx: &CliContext, path: &str, include_hidden: bool) -> Result<()> {
    let listing = ctx
        .api
        .list_files(path, include_hidden)
        .await
        .with_context(|| format!("Failed to list {}", path))?;

    if ctx.json {
        return print_json(&listing);
    }

    println!();
    println!("=== {} ===", listing.path.as_deref().unwrap_or(path));
    println!();
    if listing.entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    print_entries(&listing.entries, false);
    println!();
    Ok(())
}

async fn cmd_fs_details(ctx: &CliContext, path: &str) -> Result<()> {
    let details = ctx
        .api
        .file_details(path)
        .await
        .with_context(|| format!("Failed to fetch details for {}", path))?;

    if ctx.json {
        return print_json(&details);
    }

    println!();
    println!("=== {} ===", path);
    println!();
    let mut details = details;
    if let Some(Value::String(modified)) = details.get("last_modified") {
        let formatted = format_timestamp(modified);
        details.insert("last_modified".to_string(), Value::String(formatted));
    }
    print_map(&details, 0);
    println!();
    Ok(())
}

async fn cmd_fs_search(ctx: &CliContext, path: &str, pattern: &str, max_depth: u32) -> Result<()> {
    let results = ctx
        .api
        .search_files(path, pattern, max_depth)
        .await
        .with_context(|| format!("Failed to search {}", path))?;

    if ctx.json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("No files matching '{}' under {}", pattern, path);
        return Ok(());
    }

    println!();
    print_entries(&results, true);
    println!();
    println!("Found: {} match(es)", results.len());
    Ok(())
}

fn print_entries(entries: &[FileEntry], full_path: bool) {
    println!("{:<5} {:>10}  {:<22} {}", "TYPE", "SIZE", "MODIFIED", "NAME");
    println!("{}", "-".repeat(80));
    for entry in entries {
        let kind = match entry.kind {
            EntryKind::Directory => "dir",
            EntryKind::File => "file",
            EntryKind::Symlink => "link",
            EntryKind::Other => "?",
        };
        let size = match (entry.kind, entry.size) {
            (EntryKind::Directory, _) | (_, None) => "-".to_string(),
            (_, Some(size)) => format_bytes(size),
        };
        let modified = entry
            .last_modified
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let name = if full_path { &entry.path } else { &entry.name };
        println!("{:<5} {:>10}  {:<22} {}", kind, size, modified, name);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{}", output);
    Ok(())
}

fn print_map(map: &Map<String, Value>, indent: usize) {
    let width = map.keys().map(|k| k.len()).max().unwrap_or(0) + 1;
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        println!(
            "{:indent$}{:<width$} {}",
            "",
            format!("{}:", key),
            display_value(&map[key]),
            indent = indent,
            width = width
        );
    }
}

fn print_list(label: &str, items: Option<&[String]>) {
    match items {
        Some(items) if !items.is_empty() => {
            println!("{:<13} {}", label, items[0]);
            for item in &items[1..] {
                println!("{:<13} {}", "", item);
            }
        }
        _ => {}
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Parse `KEY=VALUE`
fn parse_env(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("Invalid environment variable '{}', expected KEY=VALUE", entry),
    }
}

/// Parse `HOST:CONTAINER[/PROTOCOL]`
fn parse_port(entry: &str) -> Result<PortMapping> {
    let (ports, protocol) = entry.split_once('/').unwrap_or((entry, "tcp"));
    let Some((host, container)) = ports.split_once(':') else {
        bail!("Invalid port mapping '{}', expected HOST:CONTAINER", entry);
    };
    for port in [host, container] {
        if !matches!(port.trim().parse::<u16>(), Ok(p) if p > 0) {
            bail!("Invalid port '{}' in '{}'", port, entry);
        }
    }
    if !matches!(protocol, "tcp" | "udp") {
        bail!("Invalid protocol '{}', expected tcp or udp", protocol);
    }
    Ok(PortMapping {
        host_port: host.trim().to_string(),
        container_port: container.trim().to_string(),
        protocol: protocol.to_string(),
    })
}

/// Parse `HOST:CONTAINER[:ro]`
fn parse_volume(entry: &str) -> Result<VolumeMapping> {
    let parts: Vec<&str> = entry.split(':').collect();
    let (host, container, read_only) = match parts.as_slice() {
        [host, container] => (*host, *container, false),
        [host, container, "ro"] => (*host, *container, true),
        [host, container, "rw"] => (*host, *container, false),
        _ => bail!("Invalid volume '{}', expected HOST:CONTAINER[:ro]", entry),
    };
    if host.is_empty() || container.is_empty() {
        bail!("Invalid volume '{}', both paths are required", entry);
    }
    Ok(VolumeMapping {
        host_path: host.to_string(),
        container_path: container.to_string(),
        read_only,
    })
}

/// Render a server timestamp as e.g. `Mar 4, 2024 3:07 PM`.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS` and unix seconds; anything
/// else is returned unchanged.
fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%b %-d, %Y %-I:%M %p";
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format(DISPLAY).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format(DISPLAY).to_string();
        }
    }
    if let Some(parsed) = raw.parse::<i64>().ok().and_then(|s| DateTime::from_timestamp(s, 0)) {
        return parsed.format(DISPLAY).to_string();
    }
    raw.to_string()
}

/// Format bytes to human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
