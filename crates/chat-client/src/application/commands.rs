//! Parsing of the commands a user types.
//!
//! One line of input is one command.  The first whitespace-separated word
//! selects the command; the rest of the line is its argument.

use chat_core::SessionId;
use thiserror::Error;

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { nickname: String },
    Send { receiver: SessionId, message: String },
    Online,
    Logout,
    Help,
}

/// Why a line could not be turned into a command, or why a command is not
/// allowed right now.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid nickname")]
    InvalidNickname,

    #[error("Usage: send <id> <message>")]
    SendUsage,

    #[error("Invalid user id '{0}'")]
    InvalidReceiver(String),

    #[error("Unknown command '{0}', type help for the command list")]
    Unknown(String),

    #[error("Please login first")]
    NotLoggedIn,

    #[error("Already logged in")]
    AlreadyLoggedIn,
}

/// Parses one input line.  Returns `Ok(None)` for a blank line.
///
/// # Example
///
/// ```rust
/// use chat_client::application::{parse_command, Command};
///
/// let cmd = parse_command("login alice smith").unwrap();
/// assert_eq!(cmd, Some(Command::Login { nickname: "alice".to_string() }));
/// ```
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (line, ""),
    };

    let command = match word {
        "login" => {
            let nickname = rest.split_whitespace().next().ok_or(CommandError::InvalidNickname)?;
            Command::Login { nickname: nickname.to_string() }
        }
        "send" => {
            let (id, message) = rest.split_once(char::is_whitespace).ok_or(CommandError::SendUsage)?;
            let receiver = id
                .parse::<SessionId>()
                .map_err(|_| CommandError::InvalidReceiver(id.to_string()))?;
            Command::Send { receiver, message: message.to_string() }
        }
        "online" => Command::Online,
        "logout" => Command::Logout,
        "help" => Command::Help,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
