//! ChatClient: executes user commands against the broker connection.
//!
//! The driver owns the connection in one of two shapes:
//!
//! ```text
//!  Connected(Connection) ──login ok──▶ Online { writer, receive task }
//! ```
//!
//! Output for the user (help text, local echoes, error hints, and everything
//! the receive task renders) goes to one `mpsc` channel so the binary prints
//! it from a single place.

use chat_core::ClientFrame;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::render::HELP;
use crate::application::{parse_command, Action, ClientState};
use crate::infrastructure::connection::{receive_loop, ClientError, Connection, FrameWriter};

/// Whether the input loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum Link<R, W> {
    Connected(Connection<R, W>),
    Online {
        writer: FrameWriter<W>,
        receiver: JoinHandle<Result<(), ClientError>>,
    },
    /// Transient placeholder while the link changes shape.
    Gone,
}

/// Interactive chat client over one broker connection.
pub struct ChatClient<R, W> {
    state: ClientState,
    link: Link<R, W>,
    out: mpsc::UnboundedSender<String>,
}

impl<R, W> ChatClient<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(conn: Connection<R, W>, out: mpsc::UnboundedSender<String>) -> Self {
        Self {
            state: ClientState::new(),
            link: Link::Connected(conn),
            out,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Handles one line typed by the user.
    ///
    /// Mistakes in the input (unknown command, missing login, bad id) are
    /// printed and do not end the client.
    ///
    /// # Errors
    ///
    /// Connection failures, and a rejected login (the broker closes the
    /// connection after rejecting one).
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow, ClientError> {
        let action = match parse_command(line).and_then(|cmd| match cmd {
            Some(cmd) => self.state.plan(cmd).map(Some),
            None => Ok(None),
        }) {
            Ok(Some(action)) => action,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                self.print(e.to_string());
                return Ok(Flow::Continue);
            }
        };

        match action {
            Action::Help => {
                for line in HELP {
                    self.print(*line);
                }
                Ok(Flow::Continue)
            }
            Action::Login(request) => {
                let Link::Connected(mut conn) = std::mem::replace(&mut self.link, Link::Gone) else {
                    return Err(ClientError::Closed);
                };
                let id = conn.login(&request).await?;
                info!(%id, nickname = %request.user, "logged in");
                self.state.logged_in(id, request.user.clone());
                self.print(format!("[Client] logged in as {} (id {id})", request.user));

                let (reader, writer) = conn.into_parts();
                let receiver = tokio::spawn(receive_loop(reader, self.out.clone()));
                self.link = Link::Online { writer, receiver };
                Ok(Flow::Continue)
            }
            Action::Send { frame, echo } => {
                self.writer()?.send(&frame).await?;
                if let Some(echo) = echo {
                    self.print(echo);
                }
                Ok(Flow::Continue)
            }
            Action::Logout => {
                let writer = self.writer()?;
                writer.send(&ClientFrame::Logout).await?;
                if let Err(e) = writer.shutdown().await {
                    warn!("shutdown after logout failed: {e}");
                }
                self.state.logged_out();
                Ok(Flow::Quit)
            }
        }
    }

    /// Resolves when the receive task has ended (the broker hung up).
    /// Never resolves before login.
    pub async fn disconnected(&mut self) {
        match &mut self.link {
            Link::Online { receiver, .. } => {
                if let Ok(Err(e)) = receiver.await {
                    warn!("receive task ended: {e}");
                }
                self.link = Link::Gone;
            }
            _ => std::future::pending().await,
        }
    }

    fn writer(&mut self) -> Result<&mut FrameWriter<W>, ClientError> {
        match &mut self.link {
            Link::Online { writer, .. } => Ok(writer),
            _ => Err(ClientError::Closed),
        }
    }

    fn print(&self, line: impl Into<String>) {
        // The receiving side only disappears while the binary is exiting.
        let _ = self.out.send(line.into());
    }
}

impl<R, W> Drop for ChatClient<R, W> {
    fn drop(&mut self) {
        if let Link::Online { receiver, .. } = &self.link {
            receiver.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
