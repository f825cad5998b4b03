use std::collections::HashMap;
use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(256),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => {
                self.buffer.write_u8(markers::NUMBER);
                self.buffer.write_f64_be(*n)?;
            }
            Amf0Value::Boolean(b) => {
                self.buffer.write_u8(markers::BOOLEAN);
                self.buffer.write_u8(u8::from(*b));
            }
            Amf0Value::String(s) => {
                // Short strings that overflow the 16-bit length go out as long strings
                if s.len() > u16::MAX as usize {
                    self.write_long_string(s)?;
                } else {
                    self.buffer.write_u8(markers::STRING);
                    self.write_short_utf8(s)?;
                }
            }
            Amf0Value::Object(obj) => {
                self.buffer.write_u8(markers::OBJECT);
                self.write_properties(obj)?;
            }
            Amf0Value::Null => self.buffer.write_u8(markers::NULL),
            Amf0Value::Undefined => self.buffer.write_u8(markers::UNDEFINED),
            Amf0Value::EcmaArray(obj) => {
                self.buffer.write_u8(markers::ECMA_ARRAY);
                self.buffer.write_u32_be(obj.len() as u32)?;
                self.write_properties(obj)?;
            }
            Amf0Value::StrictArray(items) => {
                self.buffer.write_u8(markers::STRICT_ARRAY);
                self.buffer.write_u32_be(items.len() as u32)?;
                for item in items {
                    self.encode(item)?;
                }
            }
            Amf0Value::Date(millis, timezone) => {
                self.buffer.write_u8(markers::DATE);
                self.buffer.write_f64_be(*millis)?;
                self.buffer.write_i16_be(*timezone)?;
            }
            Amf0Value::LongString(s) => self.write_long_string(s)?,
        }
        Ok(())
    }

    fn write_long_string(&mut self, value: &str) -> Result<()> {
        self.buffer.write_u8(markers::LONG_STRING);
        self.buffer.write_u32_be(value.len() as u32)?;
        self.buffer.write_bytes(value.as_bytes());
        Ok(())
    }

    /// String without type marker (object keys and short strings)
    fn write_short_utf8(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len())
            .map_err(|_| Error::amf_encode(format!("String of {} bytes exceeds u16 length", value.len())))?;
        self.buffer.write_u16_be(len)?;
        self.buffer.write_bytes(value.as_bytes());
        Ok(())
    }

    fn write_properties(&mut self, obj: &HashMap<String, Amf0Value>) -> Result<()> {
        for (key, value) in obj {
            self.write_short_utf8(key)?;
            self.encode(value)?;
        }
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}
