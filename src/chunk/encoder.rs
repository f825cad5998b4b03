use std::collections::HashMap;
use log::info;
use crate::{ByteBuffer, Error, Result};
use crate::chunk::{Chunk, MessageHeader};
use crate::protocol::{
    ChunkStreamId, RtmpHeader, RtmpPacket, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP,
    MAX_CHUNK_SIZE, MAX_MESSAGE_LENGTH, MIN_CHUNK_SIZE,
};

/// Splits packets into chunks, compressing headers against the previous
/// packet sent on the same chunk stream
pub struct ChunkEncoder {
    /// Previous headers for each chunk stream
    prev_headers: HashMap<ChunkStreamId, RtmpHeader>,

    /// Current chunk size for writing
    chunk_size: u32,
}

impl ChunkEncoder {
    /// Create new chunk encoder
    pub fn new() -> Self {
        ChunkEncoder {
            prev_headers: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Set outgoing chunk size. Out-of-range values are rejected, never
    /// clamped.
    pub fn set_chunk_size(&mut self, size: u32) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(Error::ChunkSizeRejected {
                requested: size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        if size != self.chunk_size {
            info!("Outgoing chunk size {} -> {}", self.chunk_size, size);
        }
        self.chunk_size = size;
        Ok(())
    }

    /// Forget every previously sent header so the next packet on each
    /// chunk stream goes out as Type 0
    pub fn reset(&mut self) {
        self.prev_headers.clear();
    }

    /// Split a packet into chunks
    pub fn encode(&mut self, packet: &RtmpPacket, force_type0: bool) -> Result<Vec<Chunk>> {
        let payload_len = packet.payload.len();
        if payload_len as u64 > MAX_MESSAGE_LENGTH as u64 {
            return Err(Error::protocol(format!(
                "Message of {} bytes exceeds the 3-byte length field",
                payload_len
            )));
        }

        let mut header = packet.header;
        header.message_length = payload_len as u32;
        let cs_id = header.chunk_stream_id;

        let first = self.select_header(&header, force_type0);
        let extended = first
            .timestamp_field()
            .filter(|t| *t >= EXTENDED_TIMESTAMP);

        let chunk_size = self.chunk_size as usize;
        let mut chunks = Vec::with_capacity(payload_len.div_ceil(chunk_size).max(1));

        let first_end = payload_len.min(chunk_size);
        chunks.push(Chunk::new(cs_id, first, extended, packet.payload[..first_end].to_vec()));

        // Continuation chunks (type 3) repeat the extended field of the first
        for piece in packet.payload[first_end..].chunks(chunk_size) {
            chunks.push(Chunk::new(cs_id, MessageHeader::Type3, extended, piece.to_vec()));
        }

        // Store header for delta encoding
        self.prev_headers.insert(cs_id, header);

        Ok(chunks)
    }

    /// Split a packet and serialize the chunks back to back
    pub fn encode_to_bytes(&mut self, packet: &RtmpPacket, force_type0: bool) -> Result<Vec<u8>> {
        let chunks = self.encode(packet, force_type0)?;
        let total = chunks.iter().map(Chunk::encoded_len).sum();
        let mut buffer = ByteBuffer::with_capacity(total);
        for chunk in &chunks {
            chunk.encode(&mut buffer)?;
        }
        Ok(buffer.into_vec())
    }

    fn select_header(&self, header: &RtmpHeader, force_type0: bool) -> MessageHeader {
        let type0 = MessageHeader::Type0 {
            timestamp: header.timestamp,
            message_length: header.message_length,
            message_type: header.message_type,
            message_stream_id: header.message_stream_id,
        };

        if force_type0 {
            return type0;
        }
        let Some(prev) = self.prev_headers.get(&header.chunk_stream_id) else {
            return type0;
        };

        // Type 1 and 2 cannot carry a stream id or a negative delta
        if prev.message_stream_id != header.message_stream_id {
            return type0;
        }
        let Some(delta) = header.timestamp.delta_from(prev.timestamp) else {
            return type0;
        };

        if prev.message_type == header.message_type && prev.message_length == header.message_length {
            MessageHeader::Type2 { timestamp_delta: delta }
        } else {
            MessageHeader::Type1 {
                timestamp_delta: delta,
                message_length: header.message_length,
                message_type: header.message_type,
            }
        }
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}
