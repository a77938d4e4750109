//! Broker configuration types.
//!
//! [`BrokerConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from defaults, an optional TOML file, and CLI
//! arguments (see `infrastructure::storage::config` and `main.rs`), then
//! shared behind an `Arc`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use chat_core::DEFAULT_MAX_FRAME_LEN;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9999;

/// Default listen address: every IPv4 interface on [`DEFAULT_PORT`].
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT));

/// Default length of the pending-connection queue passed to `listen()`.
pub const DEFAULT_BACKLOG: u32 = 10;

/// Default time between two heartbeat sweeps.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// All runtime configuration for the broker.
///
/// # Example
///
/// ```rust
/// use chat_broker::domain::BrokerConfig;
///
/// let cfg = BrokerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 9999);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// The address and port the listener binds to.
    pub bind_addr: SocketAddr,

    /// Backlog handed to `listen()`.  Bounds only the kernel's queue of
    /// not-yet-accepted connections; accepted connections are unlimited.
    pub backlog: u32,

    /// How often every online session is probed with a `connection_check`.
    ///
    /// A probe that has not been written within one interval counts as failed.
    pub heartbeat_interval: Duration,

    /// Longest accepted inbound frame in bytes, excluding the newline.
    pub max_frame_len: usize,
}

impl Default for BrokerConfig {
    /// | Field              | Default          |
    /// |--------------------|------------------|
    /// | bind_addr          | `0.0.0.0:9999`   |
    /// | backlog            | 10               |
    /// | heartbeat_interval | 5 seconds        |
    /// | max_frame_len      | 64 KiB           |
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            backlog: DEFAULT_BACKLOG,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
