//! chat-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do?
//!
//! The client is an interactive terminal program.  The user types commands:
//!
//! ```text
//! login <nickname>        log in (only the first word is used)
//! send <id> <message>     send a direct message to session <id>
//! online                  list online users
//! logout                  log out and exit
//! help                    show this list
//! ```
//!
//! After a successful login a background task prints everything the broker
//! sends: relayed messages, `online` replies, and error notices.  Heartbeat
//! probes are silently ignored.

/// Application layer: command parsing, client state, and output rendering.
pub mod application;

/// Infrastructure layer: the TCP connection and the command driver.
pub mod infrastructure;
