//! All chat protocol frame types.
//!
//! Every frame is a single JSON object.  Client → broker frames carry a
//! `"type"` discriminator, except for the login frame which is recognised by
//! its shape (a `"user"` field).  Broker → client frames come in three shapes:
//!
//! ```json
//! {"id":5}                                                          // login reply
//! {"sender_id":3,"sender_nickname":"alice","message":"hi"}          // chat relay
//! {"sender_id":0,"sender_nickname":"System","type":"error","message":"User does not exist"}
//! ```
//!
//! System frames always carry `sender_id = 0` and `sender_nickname = "System"`,
//! which is how a client tells them apart from peer chat frames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::session_id::SessionId;

/// Nickname carried by every broker-originated frame.
pub const SYSTEM_NICKNAME: &str = "System";

/// Point-in-time view of who is online, keyed by session id.
///
/// A `BTreeMap` keeps the JSON object ordered by ascending id.
pub type OnlineUsers = BTreeMap<SessionId, String>;

// ── Client → broker ───────────────────────────────────────────────────────────

/// The first frame a client sends after connecting.
///
/// Older clients also send `"type": "login"`; unknown fields are ignored, so
/// that form is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// The nickname the client wants to be known by.  Not required to be unique.
    pub user: String,
}

/// Frames a logged-in client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Direct message to another session.
    Chat {
        /// Sender id as claimed by the client.  The broker ignores it and
        /// uses the id bound to the connection instead.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<SessionId>,
        /// Session that should receive the message.
        receiver_id: SessionId,
        /// Message text.
        message: String,
    },
    /// Request for the list of online sessions.
    Online,
    /// Graceful end of the session.
    Logout,
    /// Any `type` value this broker does not know.  Ignored so that newer
    /// clients can add frame types without breaking older brokers.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Short name of the variant for log lines (never includes message text).
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Chat { .. } => "chat",
            ClientFrame::Online => "online",
            ClientFrame::Logout => "logout",
            ClientFrame::Unknown => "unknown",
        }
    }
}

// ── Broker → client ───────────────────────────────────────────────────────────

/// Reply to a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAck {
    /// The id assigned to the new session.
    pub id: SessionId,
}

/// A chat message relayed from one session to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRelay {
    pub sender_id: SessionId,
    pub sender_nickname: String,
    pub message: String,
}

/// Broker-originated notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemNotice {
    /// Reply to an `online` query.
    Online {
        sender_id: SessionId,
        sender_nickname: String,
        message: OnlineUsers,
    },
    /// Human-readable error report.
    Error {
        sender_id: SessionId,
        sender_nickname: String,
        message: String,
    },
    /// One-way liveness probe.  Clients are not expected to answer it.
    ConnectionCheck {
        sender_id: SessionId,
        sender_nickname: String,
    },
}

impl SystemNotice {
    /// Builds the reply to an `online` query.
    pub fn online(users: OnlineUsers) -> Self {
        SystemNotice::Online {
            sender_id: SessionId::SYSTEM,
            sender_nickname: SYSTEM_NICKNAME.to_string(),
            message: users,
        }
    }

    /// Builds an error notice with the given text.
    pub fn error(message: impl Into<String>) -> Self {
        SystemNotice::Error {
            sender_id: SessionId::SYSTEM,
            sender_nickname: SYSTEM_NICKNAME.to_string(),
            message: message.into(),
        }
    }

    /// Builds a heartbeat probe.
    pub fn connection_check() -> Self {
        SystemNotice::ConnectionCheck {
            sender_id: SessionId::SYSTEM,
            sender_nickname: SYSTEM_NICKNAME.to_string(),
        }
    }
}

/// Any frame the broker sends.
///
/// `untagged` because the three shapes are told apart by their fields, not by
/// a shared discriminator.  Variant order matters when decoding: system
/// notices are tried first since they also carry the relay fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    System(SystemNotice),
    Relay(ChatRelay),
    LoginAck(LoginAck),
}

impl From<SystemNotice> for ServerFrame {
    fn from(notice: SystemNotice) -> Self {
        ServerFrame::System(notice)
    }
}

impl From<ChatRelay> for ServerFrame {
    fn from(relay: ChatRelay) -> Self {
        ServerFrame::Relay(relay)
    }
}

impl From<LoginAck> for ServerFrame {
    fn from(ack: LoginAck) -> Self {
        ServerFrame::LoginAck(ack)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
