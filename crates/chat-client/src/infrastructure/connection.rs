//! TCP connection to the chat broker.
//!
//! Architecture:
//! - [`Connection`] owns both halves of the stream until login succeeds.
//! - After login it is split: the [`FrameReader`] moves into the receive
//!   task ([`receive_loop`]) and the [`FrameWriter`] stays with the driver.
//! - Received frames are rendered to text and forwarded on an `mpsc` channel;
//!   the binary prints them.

use chat_core::{
    decode_frame, encode_frame, protocol::FrameBuffer, LoginRequest, ProtocolError, ServerFrame,
    SessionId, SystemNotice, DEFAULT_MAX_FRAME_LEN,
};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::render::render;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the broker failed.
    #[error("failed to connect to broker at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream carried something that is not a frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The broker answered the login with an error notice.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// The connection was closed by the broker.
    #[error("connection closed by broker")]
    Closed,
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Reads broker frames, one per line.
///
/// The broker's `FrameReader` runs the same read/fill loop over
/// [`FrameBuffer`] with its own error type.  chat-core has no tokio
/// dependency, so the loop lives on each side.
pub struct FrameReader<R> {
    reader: R,
    buffer: FrameBuffer,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::new(DEFAULT_MAX_FRAME_LEN),
            chunk: vec![0u8; 4096].into_boxed_slice(),
        }
    }

    /// Next decodable frame, or `None` once the broker closes the stream.
    ///
    /// Lines that are valid JSON but not a known frame are logged and
    /// skipped.
    pub async fn next_frame(&mut self) -> Result<Option<ServerFrame>, ClientError> {
        loop {
            while let Some(line) = self.buffer.next_line()? {
                match decode_frame::<ServerFrame>(&line) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(ProtocolError::Empty) => {}
                    Err(e) => warn!("skipping frame: {e}"),
                }
            }
            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend(&self.chunk[..n]);
        }
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Writes client frames, one per line.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, frame: &T) -> Result<(), ClientError> {
        let bytes = encode_frame(frame)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// A connected, not-yet-logged-in client.
pub struct Connection<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl Connection<OwnedReadHalf, OwnedWriteHalf> {
    /// Opens a TCP connection to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| ClientError::ConnectFailed {
            addr: addr.to_string(),
            source,
        })?;
        let (read, write) = stream.into_split();
        Ok(Self::new(read, write))
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Connection<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Sends the login frame and waits for the broker's answer.
    ///
    /// # Errors
    ///
    /// [`ClientError::LoginRejected`] with the broker's message if it replied
    /// with an error notice, [`ClientError::Closed`] if it hung up.
    pub async fn login(&mut self, request: &LoginRequest) -> Result<SessionId, ClientError> {
        self.writer.send(request).await?;
        loop {
            match self.reader.next_frame().await? {
                Some(ServerFrame::LoginAck(ack)) => return Ok(ack.id),
                Some(ServerFrame::System(SystemNotice::Error { message, .. })) => {
                    return Err(ClientError::LoginRejected(message))
                }
                Some(other) => debug!("ignoring frame before login reply: {other:?}"),
                None => return Err(ClientError::Closed),
            }
        }
    }

    pub fn into_parts(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}

/// Reads frames until the broker closes the connection, sending every
/// rendered line to `out`.
///
/// Returns when the stream ends, when it breaks, or when `out` is dropped.
pub async fn receive_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    out: mpsc::UnboundedSender<String>,
) -> Result<(), ClientError> {
    while let Some(frame) = reader.next_frame().await? {
        for line in render(&frame) {
            if out.send(line).is_err() {
                return Ok(());
            }
        }
    }
    Err(ClientError::Closed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
