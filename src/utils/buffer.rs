use std::io::{Cursor, Result as IoResult, Error as IoError, ErrorKind};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Growable byte buffer with a read cursor.
///
/// Incoming network data is appended at the end while readers consume from
/// the cursor. A reader that runs out of bytes halfway through a structure
/// rewinds with [`ByteBuffer::set_position`] so the next attempt starts over
/// with nothing lost.
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Create a new ByteBuffer from bytes
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Create an empty ByteBuffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, typically back to a saved position
    pub fn set_position(&mut self, pos: usize) -> IoResult<()> {
        if pos > self.buffer.len() {
            return Err(IoError::new(ErrorKind::InvalidInput, "Position out of bounds"));
        }
        self.cursor = pos;
        Ok(())
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    /// Check if buffer has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Append bytes after the unread data
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Drop everything before the cursor
    pub fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
    }

    fn ensure(&self, n: usize) -> IoResult<()> {
        if !self.has_remaining(n) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "Not enough bytes"));
        }
        Ok(())
    }

    fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.buffer[self.cursor..])
    }

    /// Read bytes into buffer
    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        self.ensure(len)?;
        let bytes = self.buffer[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        Ok(bytes)
    }

    /// Read u8
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.ensure(1)?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    /// Read u16 (big endian)
    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        self.ensure(2)?;
        let value = self.reader().read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read u16 (little endian)
    pub fn read_u16_le(&mut self) -> IoResult<u16> {
        self.ensure(2)?;
        let value = self.reader().read_u16::<LittleEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read i16 (big endian)
    pub fn read_i16_be(&mut self) -> IoResult<i16> {
        self.ensure(2)?;
        let value = self.reader().read_i16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read 3-byte unsigned integer (big endian)
    pub fn read_u24_be(&mut self) -> IoResult<u32> {
        self.ensure(3)?;
        let value = self.reader().read_u24::<BigEndian>()?;
        self.cursor += 3;
        Ok(value)
    }

    /// Read u32 (big endian)
    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        self.ensure(4)?;
        let value = self.reader().read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Read u32 (little endian)
    pub fn read_u32_le(&mut self) -> IoResult<u32> {
        self.ensure(4)?;
        let value = self.reader().read_u32::<LittleEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Read f64 (big endian)
    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        self.ensure(8)?;
        let value = self.reader().read_f64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    /// Write bytes to buffer
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write u8
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write u16 (big endian)
    pub fn write_u16_be(&mut self, value: u16) -> IoResult<()> {
        self.buffer.write_u16::<BigEndian>(value)
    }

    /// Write u16 (little endian)
    pub fn write_u16_le(&mut self, value: u16) -> IoResult<()> {
        self.buffer.write_u16::<LittleEndian>(value)
    }

    /// Write i16 (big endian)
    pub fn write_i16_be(&mut self, value: i16) -> IoResult<()> {
        self.buffer.write_i16::<BigEndian>(value)
    }

    /// Write the low 24 bits of `value` (big endian)
    pub fn write_u24_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u24::<BigEndian>(value & 0x00FF_FFFF)
    }

    /// Write u32 (big endian)
    pub fn write_u32_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<BigEndian>(value)
    }

    /// Write u32 (little endian)
    pub fn write_u32_le(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<LittleEndian>(value)
    }

    /// Write f64 (big endian)
    pub fn write_f64_be(&mut self, value: f64) -> IoResult<()> {
        self.buffer.write_f64::<BigEndian>(value)
    }

    /// Get slice of underlying buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the buffer, returning every byte written to it
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    /// Clear buffer and reset cursor
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Get length of buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
