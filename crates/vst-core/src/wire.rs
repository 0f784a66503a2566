//! VelocyStream wire format — on-wire types shared by every layer that
//! touches a raw TCP stream.
//!
//! The chunk header is `#[repr(C, packed)]` with zerocopy derives for
//! allocation-free, safe (de)serialization, the same way `summit-core`
//! treats its `ChunkHeader`. There is no unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Sent once, immediately after the TCP connect, before any chunk.
/// No response is expected.
pub const HANDSHAKE: &[u8; 11] = b"VST/1.1\r\n\r\n";

/// Size of a chunk header in bytes. Chunk sizes configured below this are
/// meaningless (a chunk must carry the header plus at least one content
/// byte to make progress, though zero-content chunks are legal for an
/// empty payload).
pub const CHUNK_HEADER_SIZE: usize = 24;

/// The per-chunk header. Wire size: 24 bytes, little-endian throughout.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ChunkHeader {
    /// header size (24) + content length.
    pub length: u32,
    /// `(index << 1) | first_bit`; on the first chunk of a multi-chunk
    /// message this instead carries `(chunk_count << 1) | 1`.
    pub chunk_x: u32,
    /// Id of the message this chunk belongs to.
    pub message_id: u64,
    /// Total payload length of the whole message. Required on the first
    /// chunk, may be zero on subsequent ones.
    pub message_length: u64,
}

assert_eq_size!(ChunkHeader, [u8; CHUNK_HEADER_SIZE]);

impl ChunkHeader {
    pub fn is_first(&self) -> bool {
        (self.chunk_x & 0x01) == 1
    }

    /// Valid only when `is_first()` is true: either the chunk's own index
    /// (single-chunk message) or the total chunk count (multi-chunk
    /// message) — see `chunk_x_first` / `chunk_x_index`.
    pub fn chunk_x_value(&self) -> u32 {
        self.chunk_x >> 1
    }
}

/// Encode `chunk_x` for the first chunk of a message made of `total_chunks`
/// chunks.
pub fn chunk_x_first(total_chunks: u32) -> u32 {
    (total_chunks << 1) | 1
}

/// Encode `chunk_x` for a non-first chunk at `index` (1-based, matching the
/// source driver: the first chunk conceptually occupies index 0, but the
/// VST wire format numbers subsequent chunks by their position starting at
/// 1 since the first chunk's low bits instead carry the total count).
pub fn chunk_x_subsequent(index: u32) -> u32 {
    index << 1
}

/// Message type discriminants carried inside the VelocyPack envelope, not
/// the chunk header.
pub mod message_type {
    pub const REQUEST: i64 = 1;
    pub const RESPONSE: i64 = 2;
    pub const AUTHENTICATION: i64 = 1000;
}

/// Protocol version carried inside the VelocyPack envelope.
pub const PROTOCOL_VERSION: i64 = 1;

/// HTTP-style method, with the small integer code VST puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Delete,
    Get,
    Post,
    Put,
    Head,
    Patch,
    Options,
}

impl Method {
    pub fn code(self) -> i64 {
        match self {
            Method::Delete => 0,
            Method::Get => 1,
            Method::Post => 2,
            Method::Put => 3,
            Method::Head => 4,
            Method::Patch => 5,
            Method::Options => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Method::Delete),
            1 => Some(Method::Get),
            2 => Some(Method::Post),
            3 => Some(Method::Put),
            4 => Some(Method::Head),
            5 => Some(Method::Patch),
            6 => Some(Method::Options),
            _ => None,
        }
    }
}
