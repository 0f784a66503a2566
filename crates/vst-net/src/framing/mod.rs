//! VelocyStream chunk framing — the data plane.
//!
//! Splits an outgoing message payload into chunks (`encode_message`) and
//! reassembles an arbitrary byte stream of interleaved chunks back into
//! whole messages (`Decoder::feed`).

mod decode;
mod encode;

pub use decode::{DecodedMessage, Decoder};
pub use encode::{encode_message, Chunk};
