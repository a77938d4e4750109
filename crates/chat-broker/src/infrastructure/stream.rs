//! Stream adapters: the tokio side of the [`FrameSink`] and [`FrameSource`]
//! seams.
//!
//! A TCP connection is split into two owned halves right after accept:
//!
//! - The **read half** goes into a [`FrameReader`], which buffers raw bytes and
//!   hands complete newline-terminated lines to the connection handler.
//! - The **write half** goes into a [`StreamSink`], which is shared through an
//!   `Arc` by the connection handler, the registry, the router, and the
//!   heartbeat monitor.
//!
//! Both adapters are generic over `AsyncRead` / `AsyncWrite`, so unit tests
//! drive them with `tokio::io::duplex` or `tokio_test::io::Builder` instead of
//! real sockets.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chat_core::{encode_frame, protocol::FrameBuffer, ServerFrame};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::application::connection::{FrameSource, SourceError};
use crate::application::session::{FrameSink, SinkError};

/// Size of the scratch buffer used for each `read()` call.
const READ_CHUNK: usize = 4096;

// ── Read side ─────────────────────────────────────────────────────────────────

/// Splits an async byte stream into lines.
///
/// TCP delivers a byte stream, not messages: one `read()` may return half a
/// frame or three frames at once.  `FrameReader` keeps unconsumed bytes in a
/// [`FrameBuffer`] between calls so that no frame is ever split or merged.
pub struct FrameReader<R> {
    reader: R,
    buffer: FrameBuffer,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// Wraps `reader`, rejecting any line longer than `max_frame_len` bytes.
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::new(max_frame_len),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for FrameReader<R> {
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        loop {
            // A previous read may already hold one or more complete lines.
            if let Some(line) = self.buffer.next_line()? {
                return Ok(Some(line));
            }

            // `read` is cancel-safe: if this future is dropped while waiting,
            // nothing has been taken out of the socket yet.
            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                if self.buffer.pending() > 0 {
                    debug!(bytes = self.buffer.pending(), "discarding unterminated data at EOF");
                }
                return Ok(None);
            }
            self.buffer.extend(&self.chunk[..n]);
        }
    }
}

// ── Write side ────────────────────────────────────────────────────────────────

/// Shared, serialized writer for one client.
///
/// The `tokio::sync::Mutex` around the writer is the per-connection write
/// lock: a whole frame (JSON plus newline) is written and flushed while the
/// lock is held, so frames from concurrent senders never interleave.
///
/// A write to a peer that stopped reading can block indefinitely.  Both
/// waiting for the lock and the write itself race against [`FrameSink::closed`],
/// so closing the sink releases every blocked sender, and [`FrameSink::close`]
/// never waits for the lock.
pub struct StreamSink<W> {
    writer: Mutex<W>,
    closed: AtomicBool,
    closed_notify: Notify,
}

impl<W: AsyncWrite + Unpin + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

async fn shutdown_writer<W: AsyncWrite + Unpin>(writer: &mut W) {
    if let Err(e) = writer.shutdown().await {
        debug!("shutdown after close failed: {e}");
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for StreamSink<W> {
    async fn send(&self, frame: &ServerFrame) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let bytes = encode_frame(frame)?;

        let mut writer = tokio::select! {
            biased;
            _ = self.closed() => return Err(SinkError::Closed),
            writer = self.writer.lock() => writer,
        };
        tokio::select! {
            biased;
            _ = self.closed() => {
                // `close` found the lock busy and left the shutdown to the
                // holder.  A partial frame may be on the wire; nothing more
                // will follow it.
                shutdown_writer(&mut *writer).await;
                Err(SinkError::Closed)
            }
            result = write_frame(&mut *writer, &bytes) => result.map_err(SinkError::from),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed_notify.notify_waiters();

        // A sender holding the lock is woken by the notification above and
        // shuts the writer down itself.
        match self.writer.try_lock() {
            Ok(mut writer) => shutdown_writer(&mut *writer).await,
            Err(_) => debug!("write in flight during close; its sender shuts down"),
        }
    }

    async fn closed(&self) {
        // Register interest before checking the flag so a concurrent `close`
        // between the two cannot be missed.
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

// ── Tests ─────────────────────────────────────────────────────────────────────
