//! Newline-delimited JSON codec for chat frames.
//!
//! Wire format:
//! ```text
//! {json object}\n{json object}\n...
//! ```
//! Each frame is one serialized JSON object followed by a single `\n`.
//! `serde_json` never emits a raw newline inside a serialized value (newlines
//! in strings are escaped as `\n`), so the delimiter is unambiguous.  A
//! trailing `\r` before the newline is tolerated on input.
//!
//! TCP is a stream protocol: one `read()` may return half a frame or several
//! frames at once.  [`FrameBuffer`] accumulates raw bytes and hands out one
//! complete line at a time, refusing lines longer than the configured limit.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use thiserror::Error;
use tracing::debug;

/// Default upper bound on a single frame, excluding the trailing newline.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The line is not valid JSON at all (syntax error or truncated input).
    #[error("undecodable frame: {0}")]
    Syntax(String),

    /// The line is valid JSON but does not have the shape of any known frame.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The line contained nothing but whitespace.
    #[error("empty frame")]
    Empty,

    /// A frame exceeded the configured size limit.
    #[error("frame too large: {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// `true` when the stream can no longer be trusted and the connection
    /// should be closed.  Malformed-but-parseable frames are not fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Syntax(_) | ProtocolError::FrameTooLarge { .. })
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Data => ProtocolError::Malformed(e.to_string()),
            Category::Syntax | Category::Eof | Category::Io => ProtocolError::Syntax(e.to_string()),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a frame as one line of JSON, including the trailing `\n`.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use chat_core::{encode_frame, LoginAck, SessionId};
///
/// let bytes = encode_frame(&LoginAck { id: SessionId::new(5) }).unwrap();
/// assert_eq!(bytes, b"{\"id\":5}\n");
/// ```
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(frame).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Decodes one frame from a single line.
///
/// The line may or may not still carry its `\n` / `\r\n` terminator.
///
/// # Errors
///
/// - [`ProtocolError::Empty`] for a blank line.
/// - [`ProtocolError::Syntax`] when the line is not JSON.
/// - [`ProtocolError::Malformed`] when the JSON does not match `T`.
///
/// # Examples
///
/// ```rust
/// use chat_core::{decode_frame, ClientFrame};
///
/// let frame: ClientFrame = decode_frame(b"{\"type\":\"online\"}\n").unwrap();
/// assert_eq!(frame, ClientFrame::Online);
/// ```
pub fn decode_frame<T: DeserializeOwned>(line: &[u8]) -> Result<T, ProtocolError> {
    let trimmed = trim_line(line);
    if trimmed.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_slice(trimmed)?)
}

/// Strips a trailing `\n` and an optional `\r` before it.
fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ── Streaming line buffer ─────────────────────────────────────────────────────

/// Accumulates bytes read from a stream and splits them into lines.
///
/// # Example
///
/// ```rust
/// use chat_core::protocol::FrameBuffer;
///
/// let mut buf = FrameBuffer::new(1024);
/// buf.extend(b"{\"type\":\"onl");
/// assert_eq!(buf.next_line().unwrap(), None);
/// buf.extend(b"ine\"}\n");
/// assert_eq!(buf.next_line().unwrap().as_deref(), Some(&b"{\"type\":\"online\"}"[..]));
/// ```
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_len: usize,
}

impl FrameBuffer {
    /// Creates an empty buffer that rejects lines longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            max_len,
        }
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete line, without its terminator.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] when a complete line, or the
    /// unterminated remainder of the buffer, exceeds the limit.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = trim_line(&line).to_vec();
                if line.len() > self.max_len {
                    debug!(len = line.len(), max = self.max_len, "rejecting oversized line");
                    return Err(ProtocolError::FrameTooLarge {
                        len: line.len(),
                        max: self.max_len,
                    });
                }
                Ok(Some(line))
            }
            // One byte of slack for a `\r` still waiting on its `\n`.
            None if self.buf.len() > self.max_len + 1 => {
                debug!(
                    pending = self.buf.len(),
                    max = self.max_len,
                    "unterminated line exceeds the limit"
                );
                Err(ProtocolError::FrameTooLarge {
                    len: self.buf.len(),
                    max: self.max_len,
                })
            }
            None => Ok(None),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
