use std::collections::HashMap;
use std::sync::Arc;
use log::{debug, info};
use crate::{Error, Result};
use crate::amf::AmfCodec;
use crate::chunk::{ChunkDecoder, DecodedChunk};
use crate::message::{MessageBody, RtmpMessage};
use crate::protocol::{ChunkStreamId, RtmpHeader, RtmpPacket, MSG_TYPE_ABORT, MSG_TYPE_SET_CHUNK_SIZE};

/// Message under reassembly on one chunk stream
struct PartialMessage {
    header: RtmpHeader,
    payload: Vec<u8>,
}

/// Turns the chunk stream back into whole messages.
///
/// Each chunk stream id has its own reassembly slot, so chunks of several
/// messages may arrive interleaved. Set Chunk Size and Abort are acted upon
/// here, before the next buffered chunk is decoded, and then handed out
/// like any other message.
pub struct MessageAssembler {
    decoder: ChunkDecoder,
    partials: HashMap<ChunkStreamId, PartialMessage>,
    codec: Arc<dyn AmfCodec>,
}

impl MessageAssembler {
    pub fn new(codec: Arc<dyn AmfCodec>) -> Self {
        MessageAssembler {
            decoder: ChunkDecoder::new(),
            partials: HashMap::new(),
            codec,
        }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.decoder.feed(data);
    }

    pub fn decoder(&self) -> &ChunkDecoder {
        &self.decoder
    }

    pub fn set_max_chunk_size(&mut self, size: u32) -> Result<()> {
        self.decoder.set_max_chunk_size(size)
    }

    /// Drop partial messages and all decoder state
    pub fn reset(&mut self) {
        self.partials.clear();
        self.decoder.reset();
    }

    /// Next complete message, decoded
    pub fn next_message(&mut self) -> Result<Option<RtmpMessage>> {
        match self.next_packet()? {
            Some(packet) => RtmpMessage::decode(&packet, self.codec.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    /// Next complete message as raw header and payload
    pub fn next_packet(&mut self) -> Result<Option<RtmpPacket>> {
        while let Some(decoded) = self.decoder.decode_chunk()? {
            if let Some(packet) = self.accumulate(decoded)? {
                self.apply_protocol_control(&packet)?;
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    fn accumulate(&mut self, decoded: DecodedChunk) -> Result<Option<RtmpPacket>> {
        let cs_id = decoded.header.chunk_stream_id;

        if decoded.starts_message {
            // The length field is the peer's claim; grow with the data instead
            let capacity = decoded
                .header
                .message_length
                .min(self.decoder.max_chunk_size()) as usize;
            if self.partials.contains_key(&cs_id) {
                debug!("{} started a new message before finishing the last", cs_id);
            }
            self.partials.insert(cs_id, PartialMessage {
                header: decoded.header,
                payload: Vec::with_capacity(capacity),
            });
        }

        let Some(partial) = self.partials.get_mut(&cs_id) else {
            return Err(Error::chunk(format!("Continuation chunk on {} without a message", cs_id)));
        };
        partial.payload.extend_from_slice(decoded.chunk.payload());

        if !decoded.completes_message {
            return Ok(None);
        }

        match self.partials.remove(&cs_id) {
            Some(done) => Ok(Some(RtmpPacket::new(done.header, done.payload))),
            None => Ok(None),
        }
    }

    fn apply_protocol_control(&mut self, packet: &RtmpPacket) -> Result<()> {
        match packet.message_type() {
            MSG_TYPE_SET_CHUNK_SIZE | MSG_TYPE_ABORT => {}
            _ => return Ok(()),
        }

        match MessageBody::decode(packet.message_type(), &packet.payload, self.codec.as_ref())? {
            MessageBody::SetChunkSize(size) => {
                self.decoder.set_max_chunk_size(size)?;
                info!("Incoming chunk size set to {}", size);
            }
            MessageBody::Abort(cs_id) => {
                debug!("Peer aborted message on {}", cs_id);
                self.partials.remove(&cs_id);
                self.decoder.abort(cs_id);
            }
            _ => {}
        }
        Ok(())
    }
}
