//! C1: the framed transport layer.

mod framed;

pub use framed::{Framing, MessageCodec, MAX_FRAME_BYTES};
