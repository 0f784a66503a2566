//! Driver configuration.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vst-driver/config.toml
//!   3. ~/.config/vst-driver/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::HostDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    SingleServer,
    ActiveFailover,
    Cluster,
}

impl Default for Topology {
    fn default() -> Self {
        Topology::SingleServer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    Basic { user: String, password: String },
    Jwt { token: String },
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_owned(), port: 8529 }
    }
}

impl From<&HostConfig> for HostDescription {
    fn from(h: &HostConfig) -> Self {
        HostDescription::new(h.host.clone(), h.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Use TLS for every connection this driver opens.
    pub use_ssl: bool,
    /// Optional PEM file with extra trust anchors; system roots are
    /// always trusted in addition.
    pub ca_file: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self { use_ssl: false, ca_file: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections per host.
    pub connections_per_host: u32,
    pub topology: Topology,
    /// Size of the dedicated single-thread executor fleet.
    pub executor_fleet_size: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connections_per_host: 1,
            topology: Topology::default(),
            executor_fleet_size: num_cpus(),
        }
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub operation_timeout_ms: u64,
    pub chunk_size_bytes: u32,
    /// 0 = no TTL; the connection lives until it errors or is closed.
    pub ttl_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 30_000,
            chunk_size_bytes: 30_000,
            ttl_ms: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.ttl_ms))
        }
    }
}

/// Top-level driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub hosts: Vec<HostConfig>,
    pub pool: PoolConfig,
    pub connection: ConnectionConfig,
    pub auth: AuthConfig,
    pub tls: TlsConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            hosts: vec![HostConfig::default()],
            pool: PoolConfig::default(),
            connection: ConnectionConfig::default(),
            auth: AuthConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("hosts list must not be empty")]
    EmptyHosts,
}

impl DriverConfig {
    /// Load config: file → env var overrides → validated result.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            DriverConfig::default()
        };
        config.apply_env_overrides();
        if config.hosts.is_empty() {
            return Err(ConfigError::EmptyHosts);
        }
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("VST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VST_POOL__CONNECTIONS_PER_HOST") {
            if let Ok(n) = v.parse() {
                self.pool.connections_per_host = n;
            }
        }
        if let Ok(v) = std::env::var("VST_POOL__TOPOLOGY") {
            self.pool.topology = match v.as_str() {
                "single_server" => Topology::SingleServer,
                "active_failover" => Topology::ActiveFailover,
                "cluster" => Topology::Cluster,
                _ => self.pool.topology,
            };
        }
        if let Ok(v) = std::env::var("VST_CONNECTION__OPERATION_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.connection.operation_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("VST_TLS__USE_SSL") {
            self.tls.use_ssl = v == "true" || v == "1";
        }
    }
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vst-driver")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/tmp"))
}
