mod amf0;
mod decoder;
mod encoder;

pub use amf0::*;
pub use decoder::*;
pub use encoder::*;

use crate::{ByteBuffer, Result};

/// Payload codec for command, data and shared-object messages.
///
/// The chunk layer never looks inside these payloads; it only needs a way to
/// turn positional values into bytes and back.
pub trait AmfCodec: Send + Sync {
    fn encode(&self, values: &[Amf0Value]) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Amf0Value>>;
}

/// AMF0 implementation of [`AmfCodec`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Amf0Codec;

impl AmfCodec for Amf0Codec {
    fn encode(&self, values: &[Amf0Value]) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        for value in values {
            encoder.encode(value)?;
        }
        Ok(encoder.into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Amf0Value>> {
        let mut buffer = ByteBuffer::new(bytes.to_vec());
        let mut decoder = Amf0Decoder::new(&mut buffer);
        let mut values = Vec::new();
        while decoder.has_remaining() {
            values.push(decoder.decode()?);
        }
        Ok(values)
    }
}
