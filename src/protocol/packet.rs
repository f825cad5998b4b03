use crate::protocol::constants::*;
use crate::protocol::ids::{ChunkStreamId, MessageStreamId, Timestamp};
use crate::message::MessageType;

/// Fully resolved message header, independent of how it was compressed
/// on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtmpHeader {
    pub timestamp: Timestamp,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: MessageStreamId,
    pub chunk_stream_id: ChunkStreamId,
}

impl RtmpHeader {
    /// Create new header
    pub fn new(
        timestamp: Timestamp,
        message_length: u32,
        message_type: u8,
        message_stream_id: MessageStreamId,
        chunk_stream_id: ChunkStreamId,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            chunk_stream_id,
        }
    }
}

/// Message-level unit: a resolved header plus the complete payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpPacket {
    pub header: RtmpHeader,
    pub payload: Vec<u8>,
}

/// Coarse grouping used by queue telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketCategory {
    Video,
    Audio,
    Other,
}

impl RtmpPacket {
    /// Create new packet; the header length always follows the payload
    pub fn new(mut header: RtmpHeader, payload: Vec<u8>) -> Self {
        header.message_length = payload.len() as u32;
        RtmpPacket { header, payload }
    }

    /// Packet on one of the conventional chunk streams for its type
    pub fn with_type(
        message_type: u8,
        timestamp: Timestamp,
        message_stream_id: MessageStreamId,
        payload: Vec<u8>,
    ) -> Self {
        let header = RtmpHeader::new(
            timestamp,
            0,
            message_type,
            message_stream_id,
            default_chunk_stream(message_type),
        );
        RtmpPacket::new(header, payload)
    }

    pub fn audio(timestamp: Timestamp, stream_id: MessageStreamId, data: Vec<u8>) -> Self {
        RtmpPacket::with_type(MSG_TYPE_AUDIO, timestamp, stream_id, data)
    }

    pub fn video(timestamp: Timestamp, stream_id: MessageStreamId, data: Vec<u8>) -> Self {
        RtmpPacket::with_type(MSG_TYPE_VIDEO, timestamp, stream_id, data)
    }

    /// Get message type
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Get message stream ID
    pub fn message_stream_id(&self) -> MessageStreamId {
        self.header.message_stream_id
    }

    pub fn chunk_stream_id(&self) -> ChunkStreamId {
        self.header.chunk_stream_id
    }

    /// Get timestamp
    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Scheduling priority, higher goes first
    pub fn priority(&self) -> u8 {
        MessageType::from_id(self.header.message_type).priority()
    }

    pub fn category(&self) -> PacketCategory {
        match self.header.message_type {
            MSG_TYPE_VIDEO => PacketCategory::Video,
            MSG_TYPE_AUDIO => PacketCategory::Audio,
            _ => PacketCategory::Other,
        }
    }

    /// Protocol control messages (types 1-6)
    pub fn is_protocol_control(&self) -> bool {
        (MSG_TYPE_SET_CHUNK_SIZE..=MSG_TYPE_SET_PEER_BW).contains(&self.header.message_type)
    }
}

/// Conventional chunk stream for a message type
pub fn default_chunk_stream(message_type: u8) -> ChunkStreamId {
    let id = match message_type {
        MSG_TYPE_SET_CHUNK_SIZE..=MSG_TYPE_SET_PEER_BW => CHUNK_STREAM_PROTOCOL,
        MSG_TYPE_AUDIO => CHUNK_STREAM_AUDIO,
        MSG_TYPE_VIDEO => CHUNK_STREAM_VIDEO,
        MSG_TYPE_DATA_AMF0 | MSG_TYPE_DATA_AMF3 => CHUNK_STREAM_DATA,
        _ => CHUNK_STREAM_COMMAND,
    };
    ChunkStreamId::from_wire(id)
}
