//! Domain entities shared by the broker and the client.

pub mod session_id;

pub use session_id::SessionId;
