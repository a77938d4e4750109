//! Chat broker: entry point.
//!
//! Accepts TCP connections from chat clients, registers each client under a
//! broker-assigned id once it logs in with a nickname, and relays direct
//! messages between online clients.  A heartbeat probes every client every few
//! seconds and drops the ones whose connection has died.
//!
//! # Usage
//!
//! ```text
//! chat-broker [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Optional TOML configuration file
//!   --bind <IP>              Listen address [default: 0.0.0.0]
//!   --port <PORT>            Listen port [default: 9999]
//!   --backlog <N>            listen() backlog [default: 10]
//!   --heartbeat-secs <SECS>  Heartbeat interval [default: 5]
//!   --log-level <LEVEL>      Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the config file, then command-line options (or
//! their environment variables).  `RUST_LOG` overrides the log level.
//!
//! | Variable              | Option             |
//! |-----------------------|--------------------|
//! | `CHAT_CONFIG`         | `--config`         |
//! | `CHAT_BIND`           | `--bind`           |
//! | `CHAT_PORT`           | `--port`           |
//! | `CHAT_BACKLOG`        | `--backlog`        |
//! | `CHAT_HEARTBEAT_SECS` | `--heartbeat-secs` |
//! | `CHAT_LOG`            | `--log-level`      |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_broker::domain::BrokerConfig;
use chat_broker::infrastructure::run_server;
use chat_broker::infrastructure::storage::{load_config, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time text chat broker.
///
/// Every option is optional; an unset option leaves the value from the
/// config file (or the built-in default) in place.
#[derive(Debug, Parser)]
#[command(name = "chat-broker", about = "Real-time text chat broker", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.  `0.0.0.0` accepts connections on every
    /// IPv4 interface.
    #[arg(long, env = "CHAT_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "CHAT_PORT")]
    port: Option<u16>,

    /// Length of the kernel queue of not-yet-accepted connections.
    #[arg(long, env = "CHAT_BACKLOG")]
    backlog: Option<u32>,

    /// Seconds between two heartbeat sweeps.
    #[arg(long, env = "CHAT_HEARTBEAT_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "CHAT_LOG")]
    log_level: Option<String>,
}

/// Fully resolved startup settings.
#[derive(Debug)]
struct Settings {
    broker: BrokerConfig,
    log_level: String,
}

impl Cli {
    /// Loads the config file (if any) and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// `--bind` is not an IP address.
    fn into_settings(self) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };
        let mut broker = file
            .to_broker_config()
            .context("invalid configuration file")?;

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .trim()
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            broker.bind_addr = SocketAddr::new(ip, broker.bind_addr.port());
        }
        if let Some(port) = self.port {
            broker.bind_addr.set_port(port);
        }
        if let Some(backlog) = self.backlog {
            broker.backlog = backlog;
        }
        if let Some(secs) = self.heartbeat_secs {
            broker.heartbeat_interval = Duration::from_secs(secs);
        }

        Ok(Settings {
            broker,
            log_level: self.log_level.unwrap_or(file.log.level),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the optional config file.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins over the
///    configured level.
/// 3. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 4. [`run_server`] binds the listener and serves until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().into_settings()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    let fallback = settings.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    info!("chat broker starting on {}", settings.broker.bind_addr);

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(settings.broker, running).await?;

    info!("chat broker stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
