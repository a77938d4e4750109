//! Client state and the login precondition.
//!
//! [`ClientState::plan`] turns a [`Command`] into the [`Action`] the driver
//! should perform, or refuses it with a [`CommandError`] when the command is
//! not allowed in the current state (`send`, `online`, and `logout` need a
//! prior login; `login` is allowed only once).

use chat_core::{ClientFrame, LoginRequest, SessionId};

use super::commands::{Command, CommandError};
use super::render;

/// Who this client is logged in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: SessionId,
    pub nickname: String,
}

/// What the driver should do for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send the login frame and wait for the reply.
    Login(LoginRequest),
    /// Send a frame; print `echo` locally if present.
    Send { frame: ClientFrame, echo: Option<String> },
    /// Send the logout frame, then stop.
    Logout,
    /// Print the help text.
    Help,
}

#[derive(Debug, Default)]
pub struct ClientState {
    identity: Option<Identity>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Records a successful login.
    pub fn logged_in(&mut self, id: SessionId, nickname: impl Into<String>) {
        self.identity = Some(Identity { id, nickname: nickname.into() });
    }

    pub fn logged_out(&mut self) {
        self.identity = None;
    }

    /// Checks the command against the current state and decides what to do.
    pub fn plan(&self, command: Command) -> Result<Action, CommandError> {
        match command {
            Command::Help => Ok(Action::Help),
            Command::Login { nickname } => {
                if self.identity.is_some() {
                    return Err(CommandError::AlreadyLoggedIn);
                }
                Ok(Action::Login(LoginRequest { user: nickname }))
            }
            Command::Send { receiver, message } => {
                let me = self.require_login()?;
                Ok(Action::Send {
                    echo: Some(render::echo(&me.nickname, receiver, &message)),
                    frame: ClientFrame::Chat {
                        sender_id: Some(me.id),
                        receiver_id: receiver,
                        message,
                    },
                })
            }
            Command::Online => {
                self.require_login()?;
                Ok(Action::Send { frame: ClientFrame::Online, echo: None })
            }
            Command::Logout => {
                self.require_login()?;
                Ok(Action::Logout)
            }
        }
    }

    fn require_login(&self) -> Result<&Identity, CommandError> {
        self.identity.as_ref().ok_or(CommandError::NotLoggedIn)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
