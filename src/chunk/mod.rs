mod header;
mod decoder;
mod encoder;
mod assembler;

pub use header::*;
pub use decoder::*;
pub use encoder::*;
pub use assembler::*;

use crate::{ByteBuffer, Result};
use crate::protocol::ChunkStreamId;

/// One wire chunk: headers plus at most one chunk-size worth of payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    basic_header: BasicHeader,
    message_header: MessageHeader,
    extended_timestamp: Option<u32>,
    payload: Vec<u8>,
}

impl Chunk {
    /// The basic header format is taken from the message header shape
    pub fn new(
        chunk_stream_id: ChunkStreamId,
        message_header: MessageHeader,
        extended_timestamp: Option<u32>,
        payload: Vec<u8>,
    ) -> Self {
        Chunk {
            basic_header: BasicHeader::new(message_header.format(), chunk_stream_id),
            message_header,
            extended_timestamp,
            payload,
        }
    }

    pub fn basic_header(&self) -> BasicHeader {
        self.basic_header
    }

    pub fn message_header(&self) -> &MessageHeader {
        &self.message_header
    }

    pub fn chunk_stream_id(&self) -> ChunkStreamId {
        self.basic_header.chunk_stream_id
    }

    pub fn format(&self) -> u8 {
        self.basic_header.format
    }

    pub fn extended_timestamp(&self) -> Option<u32> {
        self.extended_timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn encoded_len(&self) -> usize {
        self.basic_header.encoded_len()
            + MessageHeader::fixed_len(self.basic_header.format)
            + if self.extended_timestamp.is_some() { 4 } else { 0 }
            + self.payload.len()
    }

    pub fn encode(&self, buffer: &mut ByteBuffer) -> Result<()> {
        self.basic_header.encode(buffer);
        self.message_header.encode(buffer)?;
        if let Some(extended) = self.extended_timestamp {
            buffer.write_u32_be(extended)?;
        }
        buffer.write_bytes(&self.payload);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(self.encoded_len());
        self.encode(&mut buffer)?;
        Ok(buffer.into_vec())
    }
}
