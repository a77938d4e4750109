//! Turns broker frames into the text lines shown to the user.

use chat_core::{ServerFrame, SessionId, SystemNotice};

/// Lines to print for one frame received from the broker.
///
/// | Frame              | Output                                  |
/// |--------------------|-----------------------------------------|
/// | relayed chat       | `[<id>(<nick>)] <text>`                 |
/// | `online`           | `User Id: <id>, Nickname: <nick>` each  |
/// | `error`            | the message text                        |
/// | `connection_check` | nothing                                 |
/// | login reply        | nothing                                 |
pub fn render(frame: &ServerFrame) -> Vec<String> {
    match frame {
        ServerFrame::Relay(relay) => vec![format!(
            "[{}({})] {}",
            relay.sender_id, relay.sender_nickname, relay.message
        )],
        ServerFrame::System(SystemNotice::Online { message, .. }) => message
            .iter()
            .map(|(id, nick)| format!("User Id: {id}, Nickname: {nick}"))
            .collect(),
        ServerFrame::System(SystemNotice::Error { message, .. }) => vec![message.clone()],
        ServerFrame::System(SystemNotice::ConnectionCheck { .. }) | ServerFrame::LoginAck(_) => {
            Vec::new()
        }
    }
}

/// Local echo of a message this client sent.
pub fn echo(nickname: &str, receiver: SessionId, text: &str) -> String {
    format!("[{nickname}] to {receiver}: {text}")
}

pub const HELP: &[&str] = &[
    "[Help] login <nickname>      - log in; only the first word is used",
    "[Help] online                - list online users",
    "[Help] send <id> <message>   - send a message to the user with that id",
    "[Help] logout                - log out and quit",
];
