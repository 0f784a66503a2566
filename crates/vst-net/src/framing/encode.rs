//! Chunk encoding — split one message payload into a sequence of chunks.

use bytes::Bytes;
use vst_core::error::{DriverError, DriverResult};
use vst_core::wire::{chunk_x_first, chunk_x_subsequent, ChunkHeader, CHUNK_HEADER_SIZE};
use zerocopy::AsBytes;

/// One on-wire chunk, ready to be written to a socket.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub content: Bytes,
}

impl Chunk {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + self.content.len());
        out.extend_from_slice(self.header.as_bytes());
        out.extend_from_slice(&self.content);
        out
    }
}

/// Splits `payload` into chunks of at most `chunk_size` content bytes each,
/// addressed to `message_id`.
///
/// `chunk_size` is the per-chunk *content* capacity (the stride the
/// decoder's offset walk assumes), not the total wire size of a chunk —
/// see the framing codec design notes for why this reading matches the
/// chunking-boundary test fixture.
pub fn encode_message(message_id: u64, payload: &[u8], chunk_size: u32) -> DriverResult<Vec<Chunk>> {
    if chunk_size as usize <= CHUNK_HEADER_SIZE {
        return Err(DriverError::usage(format!(
            "chunk size must exceed the header size ({CHUNK_HEADER_SIZE} bytes), got {chunk_size}"
        )));
    }

    let content_capacity = chunk_size as usize;
    let total_len = payload.len();
    let chunk_count = if total_len == 0 {
        1
    } else {
        (total_len + content_capacity - 1) / content_capacity
    };

    let mut chunks = Vec::with_capacity(chunk_count);
    if chunk_count == 1 {
        let content = Bytes::copy_from_slice(payload);
        let header = ChunkHeader {
            length: (CHUNK_HEADER_SIZE + content.len()) as u32,
            chunk_x: chunk_x_first(1),
            message_id,
            message_length: total_len as u64,
        };
        chunks.push(Chunk { header, content });
        return Ok(chunks);
    }

    for i in 0..chunk_count {
        let start = i * content_capacity;
        let end = (start + content_capacity).min(total_len);
        let content = Bytes::copy_from_slice(&payload[start..end]);
        let chunk_x = if i == 0 {
            chunk_x_first(chunk_count as u32)
        } else {
            chunk_x_subsequent(i as u32)
        };
        let header = ChunkHeader {
            length: (CHUNK_HEADER_SIZE + content.len()) as u32,
            chunk_x,
            message_id,
            message_length: total_len as u64,
        };
        chunks.push(Chunk { header, content });
    }

    Ok(chunks)
}
