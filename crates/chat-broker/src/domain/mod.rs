//! Domain layer for chat-broker.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or lock types
//! - File I/O or environment variable reading

pub mod config;

pub use config::BrokerConfig;
