//! Session: one logged-in client as the rest of the broker sees it.
//!
//! A [`Session`] pairs the broker-assigned [`SessionId`] and the nickname the
//! client chose at login with a [`FrameSink`], the write side of that client's
//! connection.
//!
//! # Why a trait for the write side?
//!
//! The registry, router, and heartbeat never touch a socket directly.  They
//! only call [`FrameSink::send`] and [`FrameSink::close`].  In production the
//! sink is `infrastructure::stream::StreamSink` wrapping a TCP write half; in
//! unit tests it is a recording double or a `mockall` mock.
//!
//! # Write serialization
//!
//! Several tasks may write to the same client at once (the client's own
//! handler replying to `online`, another client's handler relaying a chat,
//! and the heartbeat).  Every [`FrameSink`] implementation must serialize its
//! writes so that frames are never interleaved on the wire.

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{ProtocolError, ServerFrame, SessionId};
use thiserror::Error;

/// Errors returned by a [`FrameSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink was already closed (evicted or logged out).
    #[error("connection already closed")]
    Closed,

    /// The frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// The underlying transport rejected the write.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The write did not complete in time.
    #[error("write timed out")]
    TimedOut,
}

/// The write side of one client connection.
///
/// Implementations must be safe to share between tasks (`Send + Sync`) and
/// must write each frame atomically with respect to other callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Encodes `frame` and writes it to the client, flushing before returning.
    async fn send(&self, frame: &ServerFrame) -> Result<(), SinkError>;

    /// Closes the write side and wakes every task waiting in [`closed`].
    ///
    /// Idempotent: closing an already-closed sink does nothing.
    ///
    /// [`closed`]: FrameSink::closed
    async fn close(&self);

    /// Resolves once [`close`] has been called (by anyone).
    ///
    /// [`close`]: FrameSink::close
    async fn closed(&self);

    /// `true` after [`close`](FrameSink::close) has been called.
    fn is_closed(&self) -> bool;
}

/// A logged-in client.
///
/// The id and nickname never change after login.  Sessions are shared as
/// `Arc<Session>`; the registry owns the canonical reference.
pub struct Session {
    id: SessionId,
    nickname: String,
    sink: Arc<dyn FrameSink>,
}

impl Session {
    /// Creates a session.  Only the registry calls this.
    pub(crate) fn new(id: SessionId, nickname: String, sink: Arc<dyn FrameSink>) -> Self {
        Self { id, nickname, sink }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Sends one frame to this session's client.
    pub async fn send(&self, frame: &ServerFrame) -> Result<(), SinkError> {
        self.sink.send(frame).await
    }

    /// Closes this session's connection.
    pub async fn close(&self) {
        self.sink.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("nickname", &self.nickname)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Test doubles ──────────────────────────────────────────────────────────────

/// In-memory sinks shared by the application-layer unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    /// Records every frame it is asked to send.  Can be told to fail writes.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        frames: Mutex<Vec<ServerFrame>>,
        fail_writes: AtomicBool,
        closed: AtomicBool,
        closed_notify: Notify,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn failing() -> Arc<Self> {
            let sink = Self::default();
            sink.fail_writes.store(true, Ordering::SeqCst);
            Arc::new(sink)
        }

        pub(crate) fn set_failing(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn frames(&self) -> Vec<ServerFrame> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&self, frame: &ServerFrame) -> Result<(), SinkError> {
            if self.is_closed() {
                return Err(SinkError::Closed);
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "injected failure",
                )));
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn close(&self) {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.closed_notify.notify_waiters();
            }
        }

        async fn closed(&self) {
            let notified = self.closed_notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
