//! # chat-core
//!
//! Shared library for the chat broker containing the session identity type,
//! the JSON protocol frames, and the newline-delimited frame codec.
//!
//! This crate is used by both the broker and the command-line client.
//! It has zero dependencies on sockets, async runtimes, or the file system.
//!
//! # Architecture overview (for beginners)
//!
//! The chat system is a small message broker: every client opens one TCP
//! connection, claims a nickname, and is handed a numeric session id.  Clients
//! then send direct messages to each other *by id*; the broker looks the
//! receiver up in its registry of online sessions and relays the message.
//!
//! This crate (`chat-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The [`SessionId`] newtype, including the reserved
//!   [`SessionId::SYSTEM`] id used by broker-originated frames.
//!
//! - **`protocol`** – The frames that travel over the wire ([`ClientFrame`],
//!   [`ServerFrame`], …) and the codec that turns them into single lines of
//!   JSON and back.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `chat_core::SessionId` instead of `chat_core::domain::session_id::SessionId`.
pub use domain::session_id::SessionId;
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError, DEFAULT_MAX_FRAME_LEN};
pub use protocol::frames::{
    ChatRelay, ClientFrame, LoginAck, LoginRequest, OnlineUsers, ServerFrame, SystemNotice,
    SYSTEM_NICKNAME,
};
