use crate::{ByteBuffer, Error, Result};
use crate::protocol::{ChunkStreamId, MessageStreamId, Timestamp, EXTENDED_TIMESTAMP};

/// First 1-3 bytes of every chunk: format type and chunk stream id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicHeader {
    pub chunk_stream_id: ChunkStreamId,
    pub format: u8,
}

impl BasicHeader {
    pub fn new(format: u8, chunk_stream_id: ChunkStreamId) -> Self {
        BasicHeader {
            chunk_stream_id,
            format: format & 0x03,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self.chunk_stream_id.value() {
            0..=63 => 1,
            64..=319 => 2,
            _ => 3,
        }
    }

    pub fn encode(&self, buffer: &mut ByteBuffer) {
        let fmt = self.format << 6;
        let id = self.chunk_stream_id.value();

        match id {
            0..=63 => buffer.write_u8(fmt | id as u8),
            64..=319 => {
                buffer.write_u8(fmt);
                buffer.write_u8((id - 64) as u8);
            }
            _ => {
                // 3-byte form carries the id low byte first
                let id = id - 64;
                buffer.write_u8(fmt | 1);
                buffer.write_u8((id & 0xFF) as u8);
                buffer.write_u8((id >> 8) as u8);
            }
        }
    }

    /// Decode from the cursor. Returns `Ok(None)`, with the cursor left
    /// untouched, when the header is not complete yet.
    pub fn decode(buffer: &mut ByteBuffer) -> Result<Option<BasicHeader>> {
        let start = buffer.position();
        let Ok(first) = buffer.read_u8() else {
            return Ok(None);
        };

        let format = first >> 6;
        let id = match first & 0x3F {
            0 => match buffer.read_u8() {
                Ok(b) => b as u32 + 64,
                Err(_) => return rewind(buffer, start),
            },
            1 => match buffer.read_u16_le() {
                Ok(v) => v as u32 + 64,
                Err(_) => return rewind(buffer, start),
            },
            n => n as u32,
        };

        Ok(Some(BasicHeader {
            chunk_stream_id: ChunkStreamId::from_wire(id),
            format,
        }))
    }
}

fn rewind<T>(buffer: &mut ByteBuffer, start: usize) -> Result<Option<T>> {
    buffer.set_position(start)?;
    Ok(None)
}

/// The four message header shapes. Types 1-3 omit fields that are
/// inherited from the previous chunk on the same chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageHeader {
    Type0 {
        timestamp: Timestamp,
        message_length: u32,
        message_type: u8,
        message_stream_id: MessageStreamId,
    },
    Type1 {
        timestamp_delta: u32,
        message_length: u32,
        message_type: u8,
    },
    Type2 {
        timestamp_delta: u32,
    },
    Type3,
}

impl MessageHeader {
    pub fn format(&self) -> u8 {
        match self {
            MessageHeader::Type0 { .. } => 0,
            MessageHeader::Type1 { .. } => 1,
            MessageHeader::Type2 { .. } => 2,
            MessageHeader::Type3 => 3,
        }
    }

    /// Fixed width of a shape, not counting any extended timestamp
    pub fn fixed_len(format: u8) -> usize {
        match format {
            0 => 11,
            1 => 7,
            2 => 3,
            _ => 0,
        }
    }

    /// Absolute timestamp or delta carried in the 3-byte field
    pub fn timestamp_field(&self) -> Option<u32> {
        match self {
            MessageHeader::Type0 { timestamp, .. } => Some(timestamp.value()),
            MessageHeader::Type1 { timestamp_delta, .. } => Some(*timestamp_delta),
            MessageHeader::Type2 { timestamp_delta } => Some(*timestamp_delta),
            MessageHeader::Type3 => None,
        }
    }

    /// Whether the 3-byte field holds the extended-timestamp escape
    pub fn has_extended_timestamp(&self) -> bool {
        self.timestamp_field().is_some_and(|t| t >= EXTENDED_TIMESTAMP)
    }

    /// Same header with the real value read from the extended field
    pub fn with_timestamp_field(self, value: u32) -> Self {
        match self {
            MessageHeader::Type0 { message_length, message_type, message_stream_id, .. } => {
                MessageHeader::Type0 {
                    timestamp: Timestamp::new(value),
                    message_length,
                    message_type,
                    message_stream_id,
                }
            }
            MessageHeader::Type1 { message_length, message_type, .. } => MessageHeader::Type1 {
                timestamp_delta: value,
                message_length,
                message_type,
            },
            MessageHeader::Type2 { .. } => MessageHeader::Type2 { timestamp_delta: value },
            MessageHeader::Type3 => MessageHeader::Type3,
        }
    }

    /// Write the fixed-width part. Values that do not fit the 3-byte
    /// field are replaced by the escape; the caller appends the 4-byte
    /// extended timestamp.
    pub fn encode(&self, buffer: &mut ByteBuffer) -> Result<()> {
        if let Some(field) = self.timestamp_field() {
            buffer.write_u24_be(field.min(EXTENDED_TIMESTAMP))?;
        }

        match self {
            MessageHeader::Type0 { message_length, message_type, message_stream_id, .. } => {
                buffer.write_u24_be(*message_length)?;
                buffer.write_u8(*message_type);
                buffer.write_u32_le(message_stream_id.value())?;
            }
            MessageHeader::Type1 { message_length, message_type, .. } => {
                buffer.write_u24_be(*message_length)?;
                buffer.write_u8(*message_type);
            }
            MessageHeader::Type2 { .. } | MessageHeader::Type3 => {}
        }
        Ok(())
    }

    /// Decode the fixed-width part of shape `format`. `Ok(None)` leaves the
    /// cursor where it was.
    pub fn decode(format: u8, buffer: &mut ByteBuffer) -> Result<Option<MessageHeader>> {
        if !buffer.has_remaining(Self::fixed_len(format)) {
            return Ok(None);
        }

        let header = match format {
            0 => {
                let timestamp = Timestamp::new(buffer.read_u24_be()?);
                let message_length = buffer.read_u24_be()?;
                let message_type = buffer.read_u8()?;
                let message_stream_id = MessageStreamId::new(buffer.read_u32_le()?);
                MessageHeader::Type0 {
                    timestamp,
                    message_length,
                    message_type,
                    message_stream_id,
                }
            }
            1 => MessageHeader::Type1 {
                timestamp_delta: buffer.read_u24_be()?,
                message_length: buffer.read_u24_be()?,
                message_type: buffer.read_u8()?,
            },
            2 => MessageHeader::Type2 {
                timestamp_delta: buffer.read_u24_be()?,
            },
            3 => MessageHeader::Type3,
            _ => return Err(Error::chunk(format!("Invalid chunk format: {}", format))),
        };

        Ok(Some(header))
    }
}
