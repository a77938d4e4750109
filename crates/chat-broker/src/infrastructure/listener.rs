//! TCP listener: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP socket on the configured address with the configured
//!    `listen()` backlog.
//! 2. Starting the [`HeartbeatMonitor`] alongside the accept loop.
//! 3. Accepting connections and spawning one Tokio task per connection.
//! 4. Wiring each connection's read half into a [`FrameReader`] and its write
//!    half into a [`StreamSink`], then handing both to a
//!    [`ConnectionHandler`].
//! 5. Stopping when the shared `running` flag is cleared.
//!
//! # Failure isolation
//!
//! A connection task never returns an error to the accept loop.  Whatever
//! goes wrong inside one session is logged by [`handle_connection`] and ends
//! only that session.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::application::{ConnectionHandler, HeartbeatMonitor, Registry};
use crate::domain::config::BrokerConfig;
use crate::infrastructure::stream::{FrameReader, StreamSink};

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound, not-yet-running broker.
///
/// Binding and running are separate steps so that callers (tests in
/// particular) can bind to port 0 and learn the real address with
/// [`Broker::local_addr`] before any client connects.
pub struct Broker {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: Arc<BrokerConfig>,
}

impl Broker {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound (for
    /// example, the port is already in use).
    pub async fn bind(config: BrokerConfig) -> anyhow::Result<Self> {
        let addr = config.bind_addr;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("failed to create listening socket")?;

        // Allows an immediate restart while old connections sit in TIME_WAIT.
        socket
            .set_reuseaddr(true)
            .context("failed to set SO_REUSEADDR")?;
        socket
            .bind(addr)
            .with_context(|| format!("failed to bind chat listener on {addr}"))?;
        let listener = socket
            .listen(config.backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The registry shared by every connection of this broker.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop and the heartbeat until `running` is set to
    /// `false`.
    ///
    /// Connection tasks that are still running when this returns are not
    /// awaited; they end when the runtime shuts down.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let local = self.local_addr().context("listener has no local address")?;
        info!(
            "chat broker listening on {local} (backlog {}, heartbeat {:?})",
            self.config.backlog, self.config.heartbeat_interval
        );

        let heartbeat = HeartbeatMonitor::new(self.registry(), self.config.heartbeat_interval);
        let heartbeat_task = tokio::spawn(heartbeat.run(Arc::clone(&running)));

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            // Short timeout so the flag is re-checked even when nobody connects.
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    info!("new connection from {peer_addr}");
                    let registry = self.registry();
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, registry, config).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }

        heartbeat_task.abort();
        Ok(())
    }
}

/// Binds according to `config` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound.
pub async fn run_server(config: BrokerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    Broker::bind(config).await?.run(running).await
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Entry point of each per-connection task.  Runs the session and logs how
/// it ended.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    config: Arc<BrokerConfig>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("connection {peer_addr}: failed to set TCP_NODELAY: {e}");
    }

    let (read_half, write_half) = stream.into_split();
    let mut source = FrameReader::new(read_half, config.max_frame_len);
    let sink = Arc::new(StreamSink::new(write_half));

    let mut handler = ConnectionHandler::new(registry, peer_addr.to_string());
    match handler.run(&mut source, sink).await {
        Ok(reason) => info!("connection {peer_addr} closed: {reason:?}"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> BrokerConfig {
        BrokerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..BrokerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_to_port_zero_reports_real_port() {
        let broker = Broker::bind(loopback_config()).await.unwrap();

        let addr = broker.local_addr().unwrap();

        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_taken() {
        // Arrange: a port that already has an active listener
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = BrokerConfig {
            bind_addr: taken.local_addr().unwrap(),
            ..BrokerConfig::default()
        };

        // Act
        let result = Broker::bind(config).await;

        // Assert
        let err = result.err().expect("bind must fail");
        assert!(format!("{err:#}").contains("failed to bind"));
    }

    #[tokio::test]
    async fn test_run_returns_after_flag_cleared() {
        // Arrange
        let broker = Broker::bind(loopback_config()).await.unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(broker.run(Arc::clone(&running)));

        // Act
        running.store(false, Ordering::SeqCst);

        // Assert
        timeout(Duration::from_secs(2), task)
            .await
            .expect("accept loop must notice the flag within a poll period")
            .unwrap()
            .unwrap();
    }
}
