//! Configuration management.
//!
//! `Config` is the raw, all-optional shape read from the JSON file and merged
//! with command line overrides. `Config::validate` turns it into `Settings`,
//! which the rest of the daemon treats as immutable for the process lifetime.

use crate::error::{Result, VmbixError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TTL and size bound for one cache of the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub ttl_minutes: u64,
    pub max_entries: usize,
}

impl CacheSettings {
    pub const fn new(ttl_minutes: u64, max_entries: usize) -> Self {
        Self { ttl_minutes, max_entries }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

/// Per-cache settings, one field per cache name reported by `vmbix.stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub vm: CacheSettings,
    pub esxi: CacheSettings,
    pub ds: CacheSettings,
    pub perf: CacheSettings,
    pub counter: CacheSettings,
    pub hri: CacheSettings,
    pub cluster: CacheSettings,
    pub pool: CacheSettings,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            vm: CacheSettings::new(15, 1000),
            esxi: CacheSettings::new(15, 100),
            ds: CacheSettings::new(15, 100),
            perf: CacheSettings::new(5, 1000),
            counter: CacheSettings::new(5, 1000),
            hri: CacheSettings::new(15, 100),
            cluster: CacheSettings::new(15, 100),
            pool: CacheSettings::new(15, 100),
        }
    }
}

/// Raw daemon configuration as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bind_address: String,
    pub listen_port: Option<u16>,
    pub pid_file: Option<PathBuf>,
    pub interval_secs: u64,
    pub max_connections: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub use_uuid: bool,
    pub escape_chars: bool,
    pub log_level: String,
    pub metrics_port: Option<u16>,
    pub caches: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: None,
            username: None,
            password: None,
            bind_address: "0.0.0.0".to_string(),
            listen_port: None,
            pid_file: None,
            interval_secs: 300,
            max_connections: 150,
            connect_timeout_ms: 30_000,
            read_timeout_ms: 30_000,
            use_uuid: false,
            escape_chars: false,
            log_level: "info".to_string(),
            metrics_port: None,
            caches: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VmbixError::InvalidConfig {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| VmbixError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    /// Check required fields and freeze the configuration.
    pub fn validate(self) -> Result<Settings> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| VmbixError::InvalidConfig { reason: format!("{} is required", name) })
        }

        let service_url = required(self.service_url.filter(|s| !s.is_empty()), "service_url")?;
        let username = required(self.username.filter(|s| !s.is_empty()), "username")?;
        let password = required(self.password, "password")?;
        let listen_port = required(self.listen_port, "listen_port")?;

        if self.max_connections == 0 {
            return Err(VmbixError::InvalidConfig {
                reason: "max_connections must be greater than zero".to_string(),
            });
        }

        let bind_address: SocketAddr =
            format!("{}:{}", self.bind_address, listen_port).parse().map_err(|e| {
                VmbixError::InvalidConfig {
                    reason: format!("Invalid bind address {}: {}", self.bind_address, e),
                }
            })?;

        Ok(Settings {
            service_url,
            username,
            password,
            bind_address,
            pid_file: self.pid_file,
            interval: Duration::from_secs(self.interval_secs),
            max_connections: self.max_connections,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            addressing: if self.use_uuid {
                AddressingMode::ByIdentifier
            } else {
                AddressingMode::ByName
            },
            escape_chars: self.escape_chars,
            log_level: self.log_level,
            metrics_port: self.metrics_port,
            caches: self.caches,
        })
    }
}

/// How item keys address hosts, virtual machines and datastores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    ByName,
    ByIdentifier,
}

/// Validated, immutable runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub service_url: String,
    pub username: String,
    pub password: String,
    pub bind_address: SocketAddr,
    pub pid_file: Option<PathBuf>,
    pub interval: Duration,
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub addressing: AddressingMode,
    pub escape_chars: bool,
    pub log_level: String,
    pub metrics_port: Option<u16>,
    pub caches: CacheConfig,
}
