//! Application layer for chat-broker.
//!
//! Contains the broker's use cases.  Each one depends only on the traits at
//! the connection seam ([`session::FrameSink`], [`connection::FrameSource`])
//! and on chat-core types, so all of them run in unit tests without sockets.

pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod router;
pub mod session;

pub use connection::{CloseReason, ConnectionError, ConnectionHandler, ConnectionState};
pub use heartbeat::HeartbeatMonitor;
pub use registry::{Registry, RegistryError};
pub use router::{Delivery, RouteError, Router};
pub use session::{FrameSink, Session, SinkError};
