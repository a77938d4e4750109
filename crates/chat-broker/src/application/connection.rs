//! ConnectionHandler: the per-connection control loop.
//!
//! One handler runs for every accepted connection.  It owns the read side of
//! the connection (through [`FrameSource`]) and shares the write side (a
//! [`FrameSink`]) with the registry once the client has logged in.
//!
//! # State machine
//!
//! ```text
//!  Connecting ──accept──▶ LoggingIn ──valid login──▶ Online ──┐
//!                            │                         │      │ chat / online /
//!                            │ bad login: error frame  │ ◀────┘ unknown type
//!                            ▼                         │
//!                          Closed ◀── logout / EOF / read error / fatal
//!                                     decode error / evicted by others
//! ```
//!
//! # Cleanup
//!
//! Whatever way the `Online` loop ends, the handler unregisters its own id
//! once and closes the sink.  Unregistering is idempotent, so a concurrent
//! eviction by the router or heartbeat is harmless.
//!
//! # Decode failures
//!
//! | Failure                                   | Effect                        |
//! |-------------------------------------------|-------------------------------|
//! | blank line                                | skipped                       |
//! | valid JSON, wrong shape (missing field …) | `error` frame, frame dropped  |
//! | invalid JSON / frame too large            | connection closed             |
//! | unknown `type`                            | ignored                       |

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{
    decode_frame, ClientFrame, LoginAck, LoginRequest, ProtocolError, SessionId, SystemNotice,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::registry::{Registry, RegistryError};
use super::router::{RouteError, Router};
use super::session::{FrameSink, SinkError};

/// Errors produced by a [`FrameSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The read side of one client connection, already split into lines.
#[async_trait]
pub trait FrameSource: Send {
    /// Returns the next complete line without its terminator, or `None` at
    /// end of stream.
    ///
    /// Must be cancel-safe: if the returned future is dropped before it
    /// completes, no received bytes are lost.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

/// Errors that end a connection abnormally.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Read(#[from] SourceError),

    #[error("protocol violation: {0}")]
    Protocol(#[source] ProtocolError),

    #[error("write to own client failed: {0}")]
    Write(#[from] SinkError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    LoggingIn,
    Online(SessionId),
    Closed,
}

/// Why a connection ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent `logout`.
    LoggedOut,
    /// The client closed its side of the connection.
    PeerClosed,
    /// The router or heartbeat evicted this session.
    Evicted,
    /// The login frame was rejected; the string is the reason sent to the client.
    LoginRejected(String),
}

/// Drives one connection from accept to close.
pub struct ConnectionHandler {
    registry: Arc<Registry>,
    router: Router,
    state: ConnectionState,
    peer: String,
}

impl ConnectionHandler {
    /// Creates a handler for a freshly accepted connection from `peer`.
    pub fn new(registry: Arc<Registry>, peer: impl Into<String>) -> Self {
        let router = Router::new(Arc::clone(&registry));
        Self {
            registry,
            router,
            state: ConnectionState::Connecting,
            peer: peer.into(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the login handshake and then the dispatch loop until the
    /// connection ends.  The sink is always closed on return.
    pub async fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        sink: Arc<dyn FrameSink>,
    ) -> Result<CloseReason, ConnectionError> {
        self.transition(ConnectionState::LoggingIn);

        let id = match self.login(source, &sink).await {
            Ok(Ok(id)) => id,
            Ok(Err(reason)) => {
                self.finish(&sink).await;
                return Ok(reason);
            }
            Err(e) => {
                self.finish(&sink).await;
                return Err(e);
            }
        };

        self.transition(ConnectionState::Online(id));
        let result = self.dispatch_loop(id, source, &sink).await;

        self.registry.unregister(id).await;
        self.finish(&sink).await;
        result
    }

    // ── Login ─────────────────────────────────────────────────────────────────

    /// Reads the login frame.  `Ok(Err(_))` means the connection ended
    /// without a session being registered.
    async fn login<S: FrameSource>(
        &mut self,
        source: &mut S,
        sink: &Arc<dyn FrameSink>,
    ) -> Result<Result<SessionId, CloseReason>, ConnectionError> {
        let request = loop {
            let Some(line) = source.next_line().await? else {
                debug!(peer = %self.peer, "closed before login");
                return Ok(Err(CloseReason::PeerClosed));
            };
            match decode_frame::<LoginRequest>(&line) {
                Ok(request) => break request,
                Err(ProtocolError::Empty) => continue,
                Err(e) => return self.reject_login(sink, format!("Invalid login: {e}")).await,
            }
        };

        let nickname = request.user.trim();
        if nickname.is_empty() {
            return self.reject_login(sink, "Invalid login: nickname must not be empty".to_string()).await;
        }

        let id = self.registry.register(nickname, Arc::clone(sink)).await?;
        if let Err(e) = sink.send(&LoginAck { id }.into()).await {
            self.registry.unregister(id).await;
            return Err(e.into());
        }
        info!(peer = %self.peer, session = %id, %nickname, "login");
        Ok(Ok(id))
    }

    async fn reject_login(
        &self,
        sink: &Arc<dyn FrameSink>,
        reason: String,
    ) -> Result<Result<SessionId, CloseReason>, ConnectionError> {
        warn!(peer = %self.peer, "login rejected: {reason}");
        sink.send(&SystemNotice::error(reason.clone()).into()).await?;
        Ok(Err(CloseReason::LoginRejected(reason)))
    }

    // ── Online ────────────────────────────────────────────────────────────────

    async fn dispatch_loop<S: FrameSource>(
        &mut self,
        id: SessionId,
        source: &mut S,
        sink: &Arc<dyn FrameSink>,
    ) -> Result<CloseReason, ConnectionError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => {
                    info!(session = %id, "connection closed by broker");
                    return Ok(CloseReason::Evicted);
                }
                next = source.next_line() => next?,
            };

            let Some(line) = next else {
                info!(session = %id, "peer disconnected");
                return Ok(CloseReason::PeerClosed);
            };

            let frame = match decode_frame::<ClientFrame>(&line) {
                Ok(frame) => frame,
                Err(ProtocolError::Empty) => continue,
                Err(e) if e.is_fatal() => {
                    warn!(session = %id, "closing on undecodable frame: {e}");
                    return Err(ConnectionError::Protocol(e));
                }
                Err(e) => {
                    warn!(session = %id, "dropping frame: {e}");
                    sink.send(&SystemNotice::error(e.to_string()).into()).await?;
                    continue;
                }
            };

            debug!(session = %id, kind = frame.kind(), "frame received");
            if let Some(reason) = self.dispatch(id, frame, sink).await? {
                return Ok(reason);
            }
        }
    }

    /// Handles one frame.  Returns `Some` when the connection should end.
    async fn dispatch(
        &mut self,
        id: SessionId,
        frame: ClientFrame,
        sink: &Arc<dyn FrameSink>,
    ) -> Result<Option<CloseReason>, ConnectionError> {
        match frame {
            ClientFrame::Chat { sender_id, receiver_id, message } => {
                if sender_id.is_some_and(|claimed| claimed != id) {
                    debug!(session = %id, claimed = ?sender_id, "ignoring claimed sender id");
                }
                self.router.deliver(id, receiver_id, message).await?;
                Ok(None)
            }
            ClientFrame::Online => {
                let users = self.registry.snapshot().await;
                sink.send(&SystemNotice::online(users).into()).await?;
                Ok(None)
            }
            ClientFrame::Logout => {
                info!(session = %id, "logout");
                Ok(Some(CloseReason::LoggedOut))
            }
            ClientFrame::Unknown => Ok(None),
        }
    }

    async fn finish(&mut self, sink: &Arc<dyn FrameSink>) {
        sink.close().await;
        self.transition(ConnectionState::Closed);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(peer = %self.peer, from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
