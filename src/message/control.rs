use crate::{ByteBuffer, Error, Result};

// User control event types
pub const EVENT_STREAM_BEGIN: u16 = 0;
pub const EVENT_STREAM_EOF: u16 = 1;
pub const EVENT_STREAM_DRY: u16 = 2;
pub const EVENT_SET_BUFFER_LENGTH: u16 = 3;
pub const EVENT_STREAM_IS_RECORDED: u16 = 4;
pub const EVENT_PING_REQUEST: u16 = 6;
pub const EVENT_PING_RESPONSE: u16 = 7;

/// User control message (type 4) events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
    Unknown { event_type: u16, data: Vec<u8> },
}

impl UserControlEvent {
    pub fn event_type(&self) -> u16 {
        match self {
            UserControlEvent::StreamBegin(_) => EVENT_STREAM_BEGIN,
            UserControlEvent::StreamEof(_) => EVENT_STREAM_EOF,
            UserControlEvent::StreamDry(_) => EVENT_STREAM_DRY,
            UserControlEvent::SetBufferLength { .. } => EVENT_SET_BUFFER_LENGTH,
            UserControlEvent::StreamIsRecorded(_) => EVENT_STREAM_IS_RECORDED,
            UserControlEvent::PingRequest(_) => EVENT_PING_REQUEST,
            UserControlEvent::PingResponse(_) => EVENT_PING_RESPONSE,
            UserControlEvent::Unknown { event_type, .. } => *event_type,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(10);
        buffer.write_u16_be(self.event_type())?;

        match self {
            UserControlEvent::StreamBegin(v)
            | UserControlEvent::StreamEof(v)
            | UserControlEvent::StreamDry(v)
            | UserControlEvent::StreamIsRecorded(v)
            | UserControlEvent::PingRequest(v)
            | UserControlEvent::PingResponse(v) => buffer.write_u32_be(*v)?,
            UserControlEvent::SetBufferLength { stream_id, buffer_ms } => {
                buffer.write_u32_be(*stream_id)?;
                buffer.write_u32_be(*buffer_ms)?;
            }
            UserControlEvent::Unknown { data, .. } => buffer.write_bytes(data),
        }

        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        let truncated = |_| Error::protocol("Truncated user control message");

        let event_type = buffer.read_u16_be().map_err(truncated)?;
        let event = match event_type {
            EVENT_STREAM_BEGIN => UserControlEvent::StreamBegin(buffer.read_u32_be().map_err(truncated)?),
            EVENT_STREAM_EOF => UserControlEvent::StreamEof(buffer.read_u32_be().map_err(truncated)?),
            EVENT_STREAM_DRY => UserControlEvent::StreamDry(buffer.read_u32_be().map_err(truncated)?),
            EVENT_SET_BUFFER_LENGTH => UserControlEvent::SetBufferLength {
                stream_id: buffer.read_u32_be().map_err(truncated)?,
                buffer_ms: buffer.read_u32_be().map_err(truncated)?,
            },
            EVENT_STREAM_IS_RECORDED => {
                UserControlEvent::StreamIsRecorded(buffer.read_u32_be().map_err(truncated)?)
            }
            EVENT_PING_REQUEST => UserControlEvent::PingRequest(buffer.read_u32_be().map_err(truncated)?),
            EVENT_PING_RESPONSE => UserControlEvent::PingResponse(buffer.read_u32_be().map_err(truncated)?),
            other => UserControlEvent::Unknown {
                event_type: other,
                data: buffer.read_bytes(buffer.remaining()).map_err(truncated)?,
            },
        };

        Ok(event)
    }
}

/// Limit type of a Set Peer Bandwidth message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBandwidthLimit {
    /// Use the announced size as is
    Hard,
    /// Use the smaller of the announced and the current size
    Soft,
    /// Hard if the previous limit was hard, otherwise ignore
    Dynamic,
}

impl PeerBandwidthLimit {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PeerBandwidthLimit::Hard),
            1 => Ok(PeerBandwidthLimit::Soft),
            2 => Ok(PeerBandwidthLimit::Dynamic),
            other => Err(Error::protocol(format!("Unknown peer bandwidth limit type: {}", other))),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PeerBandwidthLimit::Hard => 0,
            PeerBandwidthLimit::Soft => 1,
            PeerBandwidthLimit::Dynamic => 2,
        }
    }
}
