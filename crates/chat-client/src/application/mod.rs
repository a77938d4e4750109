//! Application layer for chat-client.  No I/O lives here.

pub mod commands;
pub mod render;
pub mod state;

pub use commands::{parse_command, Command, CommandError};
pub use state::{Action, ClientState, Identity};
