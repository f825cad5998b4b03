use std::collections::HashMap;
use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error, Result};

/// Deepest nesting of objects and arrays accepted from the wire
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
    depth: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer, depth: 0 }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8().map_err(truncated)?;
        match marker {
            markers::NUMBER => Ok(Amf0Value::Number(self.read_f64()?)),
            markers::BOOLEAN => Ok(Amf0Value::Boolean(self.buffer.read_u8().map_err(truncated)? != 0)),
            markers::STRING => {
                let len = self.buffer.read_u16_be().map_err(truncated)? as usize;
                Ok(Amf0Value::String(self.read_utf8(len)?))
            }
            markers::OBJECT => Ok(Amf0Value::Object(self.nested(Self::decode_properties)?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => {
                // Associative count is advisory; the end marker terminates
                self.buffer.read_u32_be().map_err(truncated)?;
                Ok(Amf0Value::EcmaArray(self.nested(Self::decode_properties)?))
            }
            markers::STRICT_ARRAY => {
                let count = self.buffer.read_u32_be().map_err(truncated)? as usize;
                let items = self.nested(|decoder| {
                    let mut items = Vec::with_capacity(count.min(1024));
                    for _ in 0..count {
                        items.push(decoder.decode()?);
                    }
                    Ok(items)
                })?;
                Ok(Amf0Value::StrictArray(items))
            }
            markers::DATE => {
                let millis = self.read_f64()?;
                let timezone = self.buffer.read_i16_be().map_err(truncated)?;
                Ok(Amf0Value::Date(millis, timezone))
            }
            markers::LONG_STRING => {
                let len = self.buffer.read_u32_be().map_err(truncated)? as usize;
                Ok(Amf0Value::LongString(self.read_utf8(len)?))
            }
            _ => Err(Error::amf_decode(format!("Unsupported AMF0 marker: 0x{:02x}", marker))),
        }
    }

    /// Run `inner` one nesting level down
    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(Error::amf_decode(format!(
                "AMF0 values nested deeper than {}",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.buffer.read_f64_be().map_err(truncated)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.buffer.read_bytes(len).map_err(truncated)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8: {}", e)))
    }

    fn decode_properties(&mut self) -> Result<HashMap<String, Amf0Value>> {
        let mut properties = HashMap::new();
        loop {
            let name_len = self.buffer.read_u16_be().map_err(truncated)? as usize;
            if name_len == 0 {
                let end = self.buffer.read_u8().map_err(truncated)?;
                if end != markers::OBJECT_END {
                    return Err(Error::amf_decode(format!("Expected object end, got 0x{:02x}", end)));
                }
                return Ok(properties);
            }
            let name = self.read_utf8(name_len)?;
            let value = self.decode()?;
            properties.insert(name, value);
        }
    }
}

fn truncated(e: std::io::Error) -> Error {
    Error::amf_decode(format!("Truncated AMF0 value: {}", e))
}
