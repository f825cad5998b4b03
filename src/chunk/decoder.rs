use std::collections::HashMap;
use std::mem;
use log::debug;
use crate::{ByteBuffer, Error, Result};
use crate::chunk::{BasicHeader, Chunk, MessageHeader};
use crate::protocol::{
    ChunkStreamId, MessageStreamId, RtmpHeader, Timestamp, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
    MIN_CHUNK_SIZE,
};

/// Last known header state of one chunk stream. Type 1-3 chunks inherit
/// whatever their header omits from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamContext {
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: MessageStreamId,
    pub timestamp: Timestamp,
    pub timestamp_delta: u32,
    /// Payload bytes still expected for the message in progress
    pub remaining_length: u32,
    /// Last type 0-2 header used the extended timestamp escape
    pub extended_timestamp: bool,
}

/// A decoded chunk together with the full header it resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    pub chunk: Chunk,
    pub header: RtmpHeader,
    pub starts_message: bool,
    pub completes_message: bool,
}

#[derive(Debug)]
enum DecodeState {
    BasicHeader,
    MessageHeader {
        basic: BasicHeader,
    },
    ExtendedTimestamp {
        basic: BasicHeader,
        header: MessageHeader,
    },
    Payload {
        basic: BasicHeader,
        header: MessageHeader,
        extended: Option<u32>,
        resolved: RtmpHeader,
        starts_message: bool,
        length: usize,
    },
}

enum Step {
    Continue,
    NeedMoreData,
    Emit(DecodedChunk),
}

/// Incremental chunk decoder.
///
/// Bytes are appended with [`ChunkDecoder::feed`] in whatever pieces the
/// network delivers; [`ChunkDecoder::decode_chunk`] yields chunks as soon as
/// they are complete and never loses a partial one.
pub struct ChunkDecoder {
    buffer: ByteBuffer,
    state: DecodeState,
    contexts: HashMap<ChunkStreamId, StreamContext>,
    max_chunk_size: u32,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        ChunkDecoder {
            buffer: ByteBuffer::with_capacity(4096),
            state: DecodeState::BasicHeader,
            contexts: HashMap::new(),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Change the incoming chunk size. Out-of-range values are rejected and
    /// the current size stays in effect.
    pub fn set_max_chunk_size(&mut self, size: u32) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(Error::ChunkSizeRejected {
                requested: size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        self.max_chunk_size = size;
        Ok(())
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.compact();
        self.buffer.extend(data);
    }

    /// Bytes received but not yet turned into chunks
    pub fn buffered(&self) -> usize {
        self.buffer.remaining()
    }

    pub fn context(&self, chunk_stream_id: ChunkStreamId) -> Option<&StreamContext> {
        self.contexts.get(&chunk_stream_id)
    }

    /// Forget the message in progress on a chunk stream (Abort message)
    pub fn abort(&mut self, chunk_stream_id: ChunkStreamId) {
        if let Some(context) = self.contexts.get_mut(&chunk_stream_id) {
            context.remaining_length = 0;
        }
    }

    /// Drop buffered bytes, decode state and every stream context
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = DecodeState::BasicHeader;
        self.contexts.clear();
        self.max_chunk_size = DEFAULT_CHUNK_SIZE;
    }

    /// Decode the next complete chunk, or `Ok(None)` if more bytes are needed
    pub fn decode_chunk(&mut self) -> Result<Option<DecodedChunk>> {
        loop {
            match self.advance()? {
                Step::Continue => continue,
                Step::NeedMoreData => return Ok(None),
                Step::Emit(chunk) => return Ok(Some(chunk)),
            }
        }
    }

    fn advance(&mut self) -> Result<Step> {
        match mem::replace(&mut self.state, DecodeState::BasicHeader) {
            DecodeState::BasicHeader => {
                let Some(basic) = BasicHeader::decode(&mut self.buffer)? else {
                    return Ok(Step::NeedMoreData);
                };
                if basic.format != 0 && !self.contexts.contains_key(&basic.chunk_stream_id) {
                    return Err(Error::chunk(format!(
                        "Type {} header on {} without a previous header",
                        basic.format, basic.chunk_stream_id
                    )));
                }
                self.state = DecodeState::MessageHeader { basic };
                Ok(Step::Continue)
            }

            DecodeState::MessageHeader { basic } => {
                let Some(header) = MessageHeader::decode(basic.format, &mut self.buffer)? else {
                    self.state = DecodeState::MessageHeader { basic };
                    return Ok(Step::NeedMoreData);
                };

                let extended = match header {
                    MessageHeader::Type3 => self.stream(basic.chunk_stream_id)?.extended_timestamp,
                    _ => header.has_extended_timestamp(),
                };

                if extended {
                    self.state = DecodeState::ExtendedTimestamp { basic, header };
                } else {
                    self.state = self.resolve(basic, header, None)?;
                }
                Ok(Step::Continue)
            }

            DecodeState::ExtendedTimestamp { basic, header } => {
                if !self.buffer.has_remaining(4) {
                    self.state = DecodeState::ExtendedTimestamp { basic, header };
                    return Ok(Step::NeedMoreData);
                }
                let value = self.buffer.read_u32_be()?;
                let header = match header {
                    MessageHeader::Type3 => header,
                    _ => header.with_timestamp_field(value),
                };
                self.state = self.resolve(basic, header, Some(value))?;
                Ok(Step::Continue)
            }

            DecodeState::Payload { basic, header, extended, resolved, starts_message, length } => {
                if !self.buffer.has_remaining(length) {
                    self.state = DecodeState::Payload {
                        basic,
                        header,
                        extended,
                        resolved,
                        starts_message,
                        length,
                    };
                    return Ok(Step::NeedMoreData);
                }

                let payload = self.buffer.read_bytes(length)?;
                let context = self.stream_mut(basic.chunk_stream_id)?;
                context.remaining_length = context.remaining_length.saturating_sub(length as u32);
                let completes_message = context.remaining_length == 0;

                Ok(Step::Emit(DecodedChunk {
                    chunk: Chunk::new(basic.chunk_stream_id, header, extended, payload),
                    header: resolved,
                    starts_message,
                    completes_message,
                }))
            }
        }
    }

    /// Merge a freshly read message header into its stream context and
    /// work out how much payload follows.
    fn resolve(
        &mut self,
        basic: BasicHeader,
        header: MessageHeader,
        extended: Option<u32>,
    ) -> Result<DecodeState> {
        let chunk_stream_id = basic.chunk_stream_id;
        let escape = header.has_extended_timestamp() || extended.is_some();

        let starts_message = match header {
            MessageHeader::Type0 { timestamp, message_length, message_type, message_stream_id } => {
                self.contexts.insert(chunk_stream_id, StreamContext {
                    message_length,
                    message_type,
                    message_stream_id,
                    timestamp,
                    timestamp_delta: 0,
                    remaining_length: message_length,
                    extended_timestamp: escape,
                });
                true
            }
            MessageHeader::Type1 { timestamp_delta, message_length, message_type } => {
                let context = self.stream_mut(chunk_stream_id)?;
                context.timestamp = context.timestamp.wrapping_add(timestamp_delta);
                context.timestamp_delta = timestamp_delta;
                context.message_length = message_length;
                context.message_type = message_type;
                context.remaining_length = message_length;
                context.extended_timestamp = escape;
                true
            }
            MessageHeader::Type2 { timestamp_delta } => {
                let context = self.stream_mut(chunk_stream_id)?;
                context.timestamp = context.timestamp.wrapping_add(timestamp_delta);
                context.timestamp_delta = timestamp_delta;
                context.extended_timestamp = escape;
                let starts = context.remaining_length == 0;
                if starts {
                    context.remaining_length = context.message_length;
                }
                starts
            }
            MessageHeader::Type3 => {
                let context = self.stream_mut(chunk_stream_id)?;
                let starts = context.remaining_length == 0;
                if starts {
                    // A new message with nothing but payload repeats the last delta
                    context.timestamp = context.timestamp.wrapping_add(context.timestamp_delta);
                    context.remaining_length = context.message_length;
                }
                starts
            }
        };

        let context = *self.stream(chunk_stream_id)?;
        let length = context.remaining_length.min(self.max_chunk_size) as usize;

        if starts_message {
            debug!(
                "{} starts message type {} len {} at {}",
                chunk_stream_id, context.message_type, context.message_length, context.timestamp
            );
        }

        Ok(DecodeState::Payload {
            basic,
            header,
            extended,
            resolved: RtmpHeader::new(
                context.timestamp,
                context.message_length,
                context.message_type,
                context.message_stream_id,
                chunk_stream_id,
            ),
            starts_message,
            length,
        })
    }

    fn stream(&self, chunk_stream_id: ChunkStreamId) -> Result<&StreamContext> {
        self.contexts
            .get(&chunk_stream_id)
            .ok_or_else(|| Error::chunk(format!("No previous header for {}", chunk_stream_id)))
    }

    fn stream_mut(&mut self, chunk_stream_id: ChunkStreamId) -> Result<&mut StreamContext> {
        self.contexts
            .get_mut(&chunk_stream_id)
            .ok_or_else(|| Error::chunk(format!("No previous header for {}", chunk_stream_id)))
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MSG_TYPE_AUDIO;

    /// Type 0 chunk on cs 10: ts 100, audio, msid 15
    fn type0_audio(length: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x0A, 0x00, 0x00, 0x64];
        bytes.extend_from_slice(&[(length >> 16) as u8, (length >> 8) as u8, length as u8]);
        bytes.extend_from_slice(&[MSG_TYPE_AUDIO, 0x0F, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_single_chunk() {
        let mut decoder = ChunkDecoder::new();
        decoder.feed(&type0_audio(9, &[1, 2, 3, 4, 5, 6, 7, 8, 9]));

        let decoded = decoder.decode_chunk().unwrap().unwrap();
        assert!(decoded.starts_message);
        assert!(decoded.completes_message);
        assert_eq!(decoded.header.timestamp, Timestamp::new(100));
        assert_eq!(decoded.header.message_stream_id, MessageStreamId::new(15));
        assert_eq!(decoded.chunk.payload().len(), 9);
        assert!(decoder.decode_chunk().unwrap().is_none());
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = type0_audio(3, &[7, 8, 9]);
        let mut decoder = ChunkDecoder::new();

        for (i, byte) in bytes.iter().enumerate() {
            decoder.feed(&[*byte]);
            let result = decoder.decode_chunk().unwrap();
            if i + 1 < bytes.len() {
                assert!(result.is_none(), "chunk emitted early at byte {}", i);
            } else {
                assert_eq!(result.unwrap().chunk.payload(), &[7, 8, 9]);
            }
        }
    }

    #[test]
    fn test_need_more_data_is_idempotent() {
        let bytes = type0_audio(4, &[1, 2, 3, 4]);
        let mut decoder = ChunkDecoder::new();
        decoder.feed(&bytes[..6]);

        assert!(decoder.decode_chunk().unwrap().is_none());
        assert!(decoder.decode_chunk().unwrap().is_none());
        assert_eq!(decoder.buffered(), 5);

        decoder.feed(&bytes[6..]);
        assert!(decoder.decode_chunk().unwrap().is_some());
    }

    #[test]
    fn test_multi_chunk_message_uses_max_chunk_size() {
        let payload: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let mut bytes = type0_audio(200, &payload[..128]);
        bytes.push(0xCA); // type 3, cs 10
        bytes.extend_from_slice(&payload[128..]);

        let mut decoder = ChunkDecoder::new();
        decoder.feed(&bytes);

        let first = decoder.decode_chunk().unwrap().unwrap();
        assert_eq!(first.chunk.payload().len(), 128);
        assert!(!first.completes_message);
        assert_eq!(decoder.context(ChunkStreamId::from_wire(10)).unwrap().remaining_length, 72);

        let second = decoder.decode_chunk().unwrap().unwrap();
        assert_eq!(second.chunk.format(), 3);
        assert!(!second.starts_message);
        assert!(second.completes_message);
        assert_eq!(second.chunk.payload(), &payload[128..]);
        assert_eq!(decoder.context(ChunkStreamId::from_wire(10)).unwrap().remaining_length, 0);
    }

    #[test]
    fn test_type2_inherits_and_adds_delta() {
        let mut bytes = type0_audio(2, &[1, 2]);
        bytes.extend_from_slice(&[0x8A, 0x00, 0x00, 0x14, 3, 4]);

        let mut decoder = ChunkDecoder::new();
        decoder.feed(&bytes);
        decoder.decode_chunk().unwrap().unwrap();

        let second = decoder.decode_chunk().unwrap().unwrap();
        assert!(second.starts_message);
        assert_eq!(second.header.timestamp, Timestamp::new(120));
        assert_eq!(second.header.message_length, 2);
        assert_eq!(second.header.message_stream_id, MessageStreamId::new(15));
    }

    #[test]
    fn test_type1_without_context_fails() {
        let mut decoder = ChunkDecoder::new();
        decoder.feed(&[0x45, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x08, 0xFF]);

        let err = decoder.decode_chunk().unwrap_err();
        assert!(err.is_fatal_framing());
    }

    #[test]
    fn test_failure_leaves_other_streams_intact() {
        let mut decoder = ChunkDecoder::new();
        decoder.feed(&type0_audio(2, &[1, 2]));
        decoder.decode_chunk().unwrap().unwrap();

        decoder.feed(&[0xC5]); // type 3 on unknown cs 5
        assert!(decoder.decode_chunk().is_err());

        let context = decoder.context(ChunkStreamId::from_wire(10)).unwrap();
        assert_eq!(context.message_length, 2);
        assert_eq!(context.timestamp, Timestamp::new(100));
    }

    #[test]
    fn test_extended_timestamp_on_continuation() {
        let mut bytes = vec![0x06, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x03, 0x09, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        bytes.extend_from_slice(&[0xC6, 0x01, 0x00, 0x00, 0x00, 0xCC]);

        let mut decoder = ChunkDecoder::new();
        decoder.set_max_chunk_size(2).unwrap();
        decoder.feed(&bytes);

        let first = decoder.decode_chunk().unwrap().unwrap();
        assert_eq!(first.header.timestamp, Timestamp::new(0x0100_0000));
        assert_eq!(first.chunk.extended_timestamp(), Some(0x0100_0000));

        let second = decoder.decode_chunk().unwrap().unwrap();
        assert_eq!(second.chunk.payload(), &[0xCC]);
        assert_eq!(second.header.timestamp, Timestamp::new(0x0100_0000));
        assert!(second.completes_message);
    }

    #[test]
    fn test_chunk_size_bounds() {
        let mut decoder = ChunkDecoder::new();
        let err = decoder.set_max_chunk_size(0).unwrap_err();
        assert!(matches!(err, Error::ChunkSizeRejected { requested: 0, .. }));
        assert_eq!(decoder.max_chunk_size(), 128);

        assert!(decoder.set_max_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
        assert!(decoder.set_max_chunk_size(4096).is_ok());
        assert_eq!(decoder.max_chunk_size(), 4096);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut decoder = ChunkDecoder::new();
        decoder.feed(&type0_audio(2, &[1, 2]));
        decoder.decode_chunk().unwrap();
        decoder.feed(&[0x0A, 0x00]);
        decoder.reset();

        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.context(ChunkStreamId::from_wire(10)).is_none());
        decoder.feed(&[0xCA]);
        assert!(decoder.decode_chunk().is_err());
    }
}
