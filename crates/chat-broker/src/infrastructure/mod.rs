//! Infrastructure layer for chat-broker.
//!
//! Everything that touches the operating system lives here: sockets, the
//! tokio stream adapters behind the application traits, and the config file.

pub mod listener;
pub mod storage;
pub mod stream;

pub use listener::{run_server, Broker};
pub use stream::{FrameReader, StreamSink};
