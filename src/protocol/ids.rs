//! Identifier value types.
//!
//! Chunk stream ids, message stream ids and timestamps are all small
//! integers on the wire. Wrapping them keeps the three spaces from being
//! mixed up in header bookkeeping.

use std::fmt;
use crate::protocol::constants::{EXTENDED_TIMESTAMP, MAX_CHUNK_STREAM_ID};
use crate::{Error, Result};

/// Header-inheritance lane multiplexed over one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkStreamId(u32);

impl ChunkStreamId {
    pub const PROTOCOL_CONTROL: ChunkStreamId = ChunkStreamId(2);

    /// Id usable for sending. 0 and 1 are basic-header escape values.
    pub fn new(id: u32) -> Result<Self> {
        if !(2..=MAX_CHUNK_STREAM_ID).contains(&id) {
            return Err(Error::protocol(format!(
                "Chunk stream id {} outside [2, {}]",
                id, MAX_CHUNK_STREAM_ID
            )));
        }
        Ok(ChunkStreamId(id))
    }

    /// Id as decoded from a basic header, without range checks
    pub(crate) fn from_wire(id: u32) -> Self {
        ChunkStreamId(id)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChunkStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs#{}", self.0)
    }
}

/// Logical RTMP stream (0 is the connection-level stream)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MessageStreamId(u32);

impl MessageStreamId {
    pub const CONTROL: MessageStreamId = MessageStreamId(0);

    /// Every 32-bit value is a valid message stream id
    pub const fn new(id: u32) -> Self {
        MessageStreamId(id)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for MessageStreamId {
    fn from(value: u32) -> Self {
        MessageStreamId(value)
    }
}

impl fmt::Display for MessageStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ms#{}", self.0)
    }
}

/// Millisecond timestamp with 32-bit wrap-around arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(u32);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn new(millis: u32) -> Self {
        Timestamp(millis)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Needs the 4-byte extended field on the wire
    pub fn is_extended(self) -> bool {
        self.0 >= EXTENDED_TIMESTAMP
    }

    pub fn wrapping_add(self, delta: u32) -> Timestamp {
        Timestamp(self.0.wrapping_add(delta))
    }

    /// Forward distance from `earlier`, or `None` when time went backwards
    pub fn delta_from(self, earlier: Timestamp) -> Option<u32> {
        self.0.checked_sub(earlier.0)
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Timestamp(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
