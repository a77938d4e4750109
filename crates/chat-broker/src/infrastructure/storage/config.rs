//! TOML configuration file for the broker.
//!
//! The file is optional.  When `--config <path>` (or `CHAT_CONFIG`) is given,
//! the file is read and every value in it overrides the built-in default;
//! command-line options are applied afterwards and win over both.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 9999
//! backlog = 10
//! max_frame_len = 65536
//!
//! [heartbeat]
//! interval_secs = 5
//!
//! [log]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a file may contain only
//! the settings it wants to change.  An empty file is valid.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_core::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{BrokerConfig, DEFAULT_BACKLOG, DEFAULT_BIND_ADDR, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level shape of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub heartbeat: HeartbeatSection,
    #[serde(default)]
    pub log: LogSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind to.  `"0.0.0.0"` binds all IPv4 interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Longest accepted inbound frame in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// `[heartbeat]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatSection {
    /// Seconds between two sweeps.  Must be at least 1.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// `[log]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self { interval_secs: default_interval_secs() }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

// ── Default value functions (used by serde) ───────────────────────────────────

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDR.ip().to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}
fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}
fn default_interval_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl FileConfig {
    /// Validates the file values and turns them into a [`BrokerConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] if `bind_address` is not an IP, and
    /// [`ConfigError::InvalidValue`] for a zero interval or frame limit.
    pub fn to_broker_config(&self) -> Result<BrokerConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.bind_address.clone()))?;
        if self.heartbeat.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat.interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.max_frame_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_frame_len",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(BrokerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            backlog: self.server.backlog,
            heartbeat_interval: Duration::from_secs(self.heartbeat.interval_secs),
            max_frame_len: self.server.max_frame_len,
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
pub fn parse_config(text: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read (including when it does not
/// exist) and [`ConfigError::Parse`] if it is not valid TOML.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
