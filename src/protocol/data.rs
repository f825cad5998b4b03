use crate::{ByteBuffer, Error, Result};
use crate::amf::{Amf0Value, AmfCodec};

/// Data message (`onMetaData`, `@setDataFrame`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpData {
    pub data_type: String,
    pub values: Vec<Amf0Value>,
}

impl RtmpData {
    /// Create new data message
    pub fn new(data_type: impl Into<String>) -> Self {
        RtmpData {
            data_type: data_type.into(),
            values: Vec::new(),
        }
    }

    pub fn encode(&self, codec: &dyn AmfCodec) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(1 + self.values.len());
        values.push(Amf0Value::String(self.data_type.clone()));
        values.extend(self.values.iter().cloned());
        codec.encode(&values)
    }

    pub fn decode(data: &[u8], codec: &dyn AmfCodec) -> Result<Self> {
        let mut values = codec.decode(data)?.into_iter();
        let data_type = match values.next() {
            Some(Amf0Value::String(s)) | Some(Amf0Value::LongString(s)) => s,
            _ => return Err(Error::amf_decode("Data type must be string")),
        };

        Ok(RtmpData {
            data_type,
            values: values.collect(),
        })
    }
}

/// Shared object message header; the event list is kept opaque
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedObjectMessage {
    pub name: String,
    pub version: u32,
    pub persistent: bool,
    pub events: Vec<u8>,
}

impl SharedObjectMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| Error::protocol("Shared object name too long"))?;
        let mut buffer = ByteBuffer::with_capacity(14 + self.name.len() + self.events.len());
        buffer.write_u16_be(name_len)?;
        buffer.write_bytes(self.name.as_bytes());
        buffer.write_u32_be(self.version)?;
        buffer.write_u32_be(u32::from(self.persistent) << 1)?;
        buffer.write_u32_be(0)?;
        buffer.write_bytes(&self.events);
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        let truncated = |_| Error::protocol("Truncated shared object message");

        let name_len = buffer.read_u16_be().map_err(truncated)? as usize;
        let name = String::from_utf8(buffer.read_bytes(name_len).map_err(truncated)?)
            .map_err(|e| Error::protocol(format!("Invalid shared object name: {}", e)))?;
        let version = buffer.read_u32_be().map_err(truncated)?;
        let flags = buffer.read_u32_be().map_err(truncated)?;
        buffer.read_u32_be().map_err(truncated)?;
        let events = buffer.read_bytes(buffer.remaining()).map_err(truncated)?;

        Ok(SharedObjectMessage {
            name,
            version,
            persistent: flags & 0x02 != 0,
            events,
        })
    }
}
