//! Protocol module containing the frame types and the line codec.

pub mod codec;
pub mod frames;

pub use codec::{decode_frame, encode_frame, FrameBuffer, ProtocolError, DEFAULT_MAX_FRAME_LEN};
pub use frames::*;
