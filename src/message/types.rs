use crate::{ByteBuffer, Error, Result};
use crate::amf::AmfCodec;
use crate::message::{PeerBandwidthLimit, UserControlEvent};
use crate::protocol::constants::*;
use crate::protocol::{
    default_chunk_stream, ChunkStreamId, MessageStreamId, RtmpCommand, RtmpData, RtmpHeader,
    RtmpPacket, SharedObjectMessage, Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Protocol control messages
    Control(ControlType),

    /// User control events
    UserControl,

    /// Audio data
    Audio,

    /// Video data
    Video,

    /// Command (AMF0/AMF3)
    Command,

    /// Data (AMF0/AMF3)
    Data,

    /// Aggregate message
    Aggregate,

    /// Shared object (AMF0/AMF3)
    SharedObject,

    /// Unknown type
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    SetChunkSize,
    Abort,
    Acknowledgement,
    WindowAcknowledgement,
    SetPeerBandwidth,
}

impl MessageType {
    /// Create from message type ID
    pub fn from_id(id: u8) -> Self {
        match id {
            MSG_TYPE_SET_CHUNK_SIZE => MessageType::Control(ControlType::SetChunkSize),
            MSG_TYPE_ABORT => MessageType::Control(ControlType::Abort),
            MSG_TYPE_ACK => MessageType::Control(ControlType::Acknowledgement),
            MSG_TYPE_USER_CONTROL => MessageType::UserControl,
            MSG_TYPE_WINDOW_ACK => MessageType::Control(ControlType::WindowAcknowledgement),
            MSG_TYPE_SET_PEER_BW => MessageType::Control(ControlType::SetPeerBandwidth),
            MSG_TYPE_AUDIO => MessageType::Audio,
            MSG_TYPE_VIDEO => MessageType::Video,
            MSG_TYPE_COMMAND_AMF0 | MSG_TYPE_COMMAND_AMF3 => MessageType::Command,
            MSG_TYPE_DATA_AMF0 | MSG_TYPE_DATA_AMF3 => MessageType::Data,
            MSG_TYPE_AGGREGATE => MessageType::Aggregate,
            MSG_TYPE_SHARED_OBJECT_AMF0 | MSG_TYPE_SHARED_OBJECT_AMF3 => MessageType::SharedObject,
            _ => MessageType::Unknown(id),
        }
    }

    /// Check if this is a protocol or user control message
    pub fn is_control(&self) -> bool {
        matches!(self, MessageType::Control(_) | MessageType::UserControl)
    }

    /// Check if this is a media message (audio/video)
    pub fn is_media(&self) -> bool {
        matches!(self, MessageType::Audio | MessageType::Video)
    }

    /// Get scheduling priority, higher goes first
    pub fn priority(&self) -> u8 {
        match self {
            MessageType::Control(_) | MessageType::UserControl => 10,
            MessageType::Command => 8,
            MessageType::Data | MessageType::SharedObject => 6,
            MessageType::Audio => 4,
            MessageType::Video => 2,
            _ => 1,
        }
    }
}

/// Decoded message payload, one variant per message type
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    SetChunkSize(u32),
    Abort(ChunkStreamId),
    Acknowledgement(u32),
    UserControl(UserControlEvent),
    WindowAckSize(u32),
    SetPeerBandwidth { size: u32, limit: PeerBandwidthLimit },
    Audio(Vec<u8>),
    Video(Vec<u8>),
    Command { command: RtmpCommand, amf3: bool },
    Data { data: RtmpData, amf3: bool },
    SharedObject { object: SharedObjectMessage, amf3: bool },
    Aggregate(Vec<u8>),
    Unknown { message_type: u8, payload: Vec<u8> },
}

impl MessageBody {
    pub fn message_type(&self) -> u8 {
        match self {
            MessageBody::SetChunkSize(_) => MSG_TYPE_SET_CHUNK_SIZE,
            MessageBody::Abort(_) => MSG_TYPE_ABORT,
            MessageBody::Acknowledgement(_) => MSG_TYPE_ACK,
            MessageBody::UserControl(_) => MSG_TYPE_USER_CONTROL,
            MessageBody::WindowAckSize(_) => MSG_TYPE_WINDOW_ACK,
            MessageBody::SetPeerBandwidth { .. } => MSG_TYPE_SET_PEER_BW,
            MessageBody::Audio(_) => MSG_TYPE_AUDIO,
            MessageBody::Video(_) => MSG_TYPE_VIDEO,
            MessageBody::Command { amf3: false, .. } => MSG_TYPE_COMMAND_AMF0,
            MessageBody::Command { amf3: true, .. } => MSG_TYPE_COMMAND_AMF3,
            MessageBody::Data { amf3: false, .. } => MSG_TYPE_DATA_AMF0,
            MessageBody::Data { amf3: true, .. } => MSG_TYPE_DATA_AMF3,
            MessageBody::SharedObject { amf3: false, .. } => MSG_TYPE_SHARED_OBJECT_AMF0,
            MessageBody::SharedObject { amf3: true, .. } => MSG_TYPE_SHARED_OBJECT_AMF3,
            MessageBody::Aggregate(_) => MSG_TYPE_AGGREGATE,
            MessageBody::Unknown { message_type, .. } => *message_type,
        }
    }

    /// Interpret a complete payload of the given message type
    pub fn decode(message_type: u8, payload: &[u8], codec: &dyn AmfCodec) -> Result<Self> {
        let body = match message_type {
            MSG_TYPE_SET_CHUNK_SIZE => {
                // Bit 31 is reserved and must be zero
                MessageBody::SetChunkSize(read_u32(payload, "Set Chunk Size")? & 0x7FFF_FFFF)
            }
            MSG_TYPE_ABORT => {
                MessageBody::Abort(ChunkStreamId::from_wire(read_u32(payload, "Abort")?))
            }
            MSG_TYPE_ACK => MessageBody::Acknowledgement(read_u32(payload, "Acknowledgement")?),
            MSG_TYPE_USER_CONTROL => MessageBody::UserControl(UserControlEvent::decode(payload)?),
            MSG_TYPE_WINDOW_ACK => {
                MessageBody::WindowAckSize(read_u32(payload, "Window Acknowledgement Size")?)
            }
            MSG_TYPE_SET_PEER_BW => {
                if payload.len() < 5 {
                    return Err(Error::protocol("Truncated Set Peer Bandwidth message"));
                }
                MessageBody::SetPeerBandwidth {
                    size: read_u32(payload, "Set Peer Bandwidth")?,
                    limit: PeerBandwidthLimit::from_u8(payload[4])?,
                }
            }
            MSG_TYPE_AUDIO => MessageBody::Audio(payload.to_vec()),
            MSG_TYPE_VIDEO => MessageBody::Video(payload.to_vec()),
            MSG_TYPE_COMMAND_AMF0 => MessageBody::Command {
                command: RtmpCommand::decode(payload, codec)?,
                amf3: false,
            },
            MSG_TYPE_COMMAND_AMF3 => MessageBody::Command {
                command: RtmpCommand::decode(skip_format_byte(payload), codec)?,
                amf3: true,
            },
            MSG_TYPE_DATA_AMF0 => MessageBody::Data {
                data: RtmpData::decode(payload, codec)?,
                amf3: false,
            },
            MSG_TYPE_DATA_AMF3 => MessageBody::Data {
                data: RtmpData::decode(skip_format_byte(payload), codec)?,
                amf3: true,
            },
            MSG_TYPE_SHARED_OBJECT_AMF0 => MessageBody::SharedObject {
                object: SharedObjectMessage::decode(payload)?,
                amf3: false,
            },
            MSG_TYPE_SHARED_OBJECT_AMF3 => MessageBody::SharedObject {
                object: SharedObjectMessage::decode(skip_format_byte(payload))?,
                amf3: true,
            },
            MSG_TYPE_AGGREGATE => MessageBody::Aggregate(payload.to_vec()),
            other => MessageBody::Unknown {
                message_type: other,
                payload: payload.to_vec(),
            },
        };

        Ok(body)
    }

    /// Serialize the payload
    pub fn encode(&self, codec: &dyn AmfCodec) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(8);
        match self {
            MessageBody::SetChunkSize(size) => buffer.write_u32_be(size & 0x7FFF_FFFF)?,
            MessageBody::Abort(cs_id) => buffer.write_u32_be(cs_id.value())?,
            MessageBody::Acknowledgement(v) | MessageBody::WindowAckSize(v) => {
                buffer.write_u32_be(*v)?
            }
            MessageBody::SetPeerBandwidth { size, limit } => {
                buffer.write_u32_be(*size)?;
                buffer.write_u8(limit.as_u8());
            }
            MessageBody::UserControl(event) => return event.encode(),
            MessageBody::Audio(data)
            | MessageBody::Video(data)
            | MessageBody::Aggregate(data)
            | MessageBody::Unknown { payload: data, .. } => return Ok(data.clone()),
            MessageBody::Command { command, amf3 } => {
                return Ok(with_format_byte(command.encode(codec)?, *amf3));
            }
            MessageBody::Data { data, amf3 } => {
                return Ok(with_format_byte(data.encode(codec)?, *amf3));
            }
            MessageBody::SharedObject { object, amf3 } => {
                return Ok(with_format_byte(object.encode()?, *amf3));
            }
        }
        Ok(buffer.into_vec())
    }
}

fn read_u32(payload: &[u8], what: &str) -> Result<u32> {
    let mut buffer = ByteBuffer::new(payload.to_vec());
    buffer
        .read_u32_be()
        .map_err(|_| Error::protocol(format!("Truncated {} message", what)))
}

/// AMF3-flavoured payloads start with a format selector byte
fn skip_format_byte(payload: &[u8]) -> &[u8] {
    payload.get(1..).unwrap_or_default()
}

fn with_format_byte(bytes: Vec<u8>, amf3: bool) -> Vec<u8> {
    if !amf3 {
        return bytes;
    }
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x00);
    out.extend(bytes);
    out
}

/// A complete, decoded message with the header it arrived (or leaves) with
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpMessage {
    pub header: RtmpHeader,
    pub body: MessageBody,
}

impl RtmpMessage {
    /// Message on the conventional chunk stream for its type
    pub fn new(body: MessageBody, timestamp: Timestamp, message_stream_id: MessageStreamId) -> Self {
        let message_type = body.message_type();
        RtmpMessage {
            header: RtmpHeader::new(
                timestamp,
                0,
                message_type,
                message_stream_id,
                default_chunk_stream(message_type),
            ),
            body,
        }
    }

    /// Protocol or user control message: chunk stream 2, message stream 0
    pub fn control(body: MessageBody) -> Self {
        RtmpMessage::new(body, Timestamp::ZERO, MessageStreamId::CONTROL)
    }

    pub fn decode(packet: &RtmpPacket, codec: &dyn AmfCodec) -> Result<Self> {
        Ok(RtmpMessage {
            header: packet.header,
            body: MessageBody::decode(packet.header.message_type, &packet.payload, codec)?,
        })
    }

    pub fn to_packet(&self, codec: &dyn AmfCodec) -> Result<RtmpPacket> {
        let mut header = self.header;
        header.message_type = self.body.message_type();
        Ok(RtmpPacket::new(header, self.body.encode(codec)?))
    }

    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    pub fn message_type(&self) -> u8 {
        self.body.message_type()
    }

    pub fn message_stream_id(&self) -> MessageStreamId {
        self.header.message_stream_id
    }

    pub fn chunk_stream_id(&self) -> ChunkStreamId {
        self.header.chunk_stream_id
    }

    pub fn priority(&self) -> u8 {
        MessageType::from_id(self.message_type()).priority()
    }
}
