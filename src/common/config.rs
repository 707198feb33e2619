//! Configuration for clusterd components

use crate::common::utils::{detect_host_ip, parse_duration};
use crate::common::{Error, Result};
use crate::supervisor::{LaunchUrls, SupervisorOptions};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CLUSTERD_CONFIG";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Coordination store client settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Local coordination store process settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            supervisor: SupervisorConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Coordination store client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Client URLs of the store. Empty means the local advertise URL.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Coordination store process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Store executable, looked up in PATH when not absolute
    #[serde(default = "default_executable")]
    pub executable: String,

    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    /// Address the store listens on and advertises. Detected when unset.
    #[serde(default)]
    pub host_ip: Option<IpAddr>,

    #[serde(default = "default_client_port")]
    pub client_port: u16,

    #[serde(default = "default_peer_port")]
    pub peer_port: u16,

    /// Passed as `--data-dir` when set
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Store stdout/stderr destination. Discarded when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default = "default_health_timeout")]
    pub health_timeout: String,

    #[serde(default = "default_health_interval")]
    pub health_interval: String,

    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,
}

fn default_executable() -> String {
    "etcd".to_string()
}
fn default_pid_file() -> PathBuf {
    PathBuf::from("/var/run/clusterd/etcd.pid")
}
fn default_env_file() -> PathBuf {
    PathBuf::from("/var/lib/clusterd/etcdenv.conf")
}
fn default_client_port() -> u16 {
    2379
}
fn default_peer_port() -> u16 {
    2380
}
fn default_health_timeout() -> String {
    "15s".to_string()
}
fn default_health_interval() -> String {
    "500ms".to_string()
}
fn default_stop_timeout() -> String {
    "10s".to_string()
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            pid_file: default_pid_file(),
            env_file: default_env_file(),
            host_ip: None,
            client_port: default_client_port(),
            peer_port: default_peer_port(),
            data_dir: None,
            log_file: None,
            health_timeout: default_health_timeout(),
            health_interval: default_health_interval(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl SupervisorConfig {
    /// Compute the listen/advertise URLs once, detecting the host address if needed.
    pub fn launch_urls(&self) -> LaunchUrls {
        let ip = self.host_ip.unwrap_or_else(detect_host_ip);
        LaunchUrls::for_host(ip, self.client_port, self.peer_port)
    }

    /// Resolve durations and URLs into the options the supervisor runs with.
    pub fn resolve(&self) -> Result<SupervisorOptions> {
        if self.executable.trim().is_empty() {
            return Err(Error::InvalidConfig("supervisor.executable is empty".into()));
        }
        if self.client_port == self.peer_port {
            return Err(Error::InvalidConfig(format!(
                "client and peer ports must differ (both {})",
                self.client_port
            )));
        }

        let health_interval = parse_duration(&self.health_interval)?;
        if health_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "supervisor.health_interval must be positive".into(),
            ));
        }

        Ok(SupervisorOptions {
            executable: PathBuf::from(&self.executable),
            pid_file: self.pid_file.clone(),
            env_file: self.env_file.clone(),
            data_dir: self.data_dir.clone(),
            log_file: self.log_file.clone(),
            health_timeout: parse_duration(&self.health_timeout)?,
            health_interval,
            stop_timeout: parse_duration(&self.stop_timeout)?,
            urls: self.launch_urls(),
        })
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file named by
    /// `CLUSTERD_CONFIG` (or `clusterd.toml`), then `CLUSTERD_*` variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "clusterd.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CLUSTERD")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("store.endpoints")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Store endpoints to use, falling back to the local advertise URL.
    pub fn store_endpoints(&self, urls: &LaunchUrls) -> Vec<String> {
        if self.store.endpoints.is_empty() {
            vec![urls.advertise_client.clone()]
        } else {
            self.store.endpoints.clone()
        }
    }
}
