//! Protocol module containing framing helpers and the springboard message types.

pub mod framing;
pub mod messages;

pub use framing::{
    encode_frame, frame_header, parse_frame_header, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE,
};
pub use messages::*;
