//! Infrastructure layer for chat-client: the broker connection and the
//! command driver that uses it.

pub mod connection;
pub mod driver;

pub use connection::{ClientError, Connection};
pub use driver::{ChatClient, Flow};
