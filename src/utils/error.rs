use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Framing failure: the byte stream can no longer be trusted
    #[error("Chunk error: {0}")]
    Chunk(String),

    /// A complete message whose payload could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("AMF decode error: {0}")]
    AmfDecode(String),

    #[error("AMF encode error: {0}")]
    AmfEncode(String),

    #[error("Chunk size {requested} rejected: must be within [{min}, {max}]")]
    ChunkSizeRejected { requested: u32, min: u32, max: u32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Message queue full ({0} pending)")]
    QueueFull(usize),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a chunk framing error
    pub fn chunk(msg: impl Into<String>) -> Self {
        Error::Chunk(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create an AMF decode error
    pub fn amf_decode(msg: impl Into<String>) -> Self {
        Error::AmfDecode(msg.into())
    }

    /// Create an AMF encode error
    pub fn amf_encode(msg: impl Into<String>) -> Self {
        Error::AmfEncode(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// True when the inbound byte stream is desynchronised and the
    /// connection has to be torn down.
    pub fn is_fatal_framing(&self) -> bool {
        matches!(self, Error::Chunk(_) | Error::Io(_))
    }

    /// Copy of this error suitable for handing to several waiters.
    ///
    /// `std::io::Error` is not `Clone`, so I/O failures are flattened into
    /// a connection error carrying the original message.
    pub fn duplicate(&self) -> Self {
        match self {
            Error::Io(e) => Error::connection(e.to_string()),
            Error::Chunk(m) => Error::Chunk(m.clone()),
            Error::Protocol(m) => Error::Protocol(m.clone()),
            Error::AmfDecode(m) => Error::AmfDecode(m.clone()),
            Error::AmfEncode(m) => Error::AmfEncode(m.clone()),
            Error::ChunkSizeRejected { requested, min, max } => Error::ChunkSizeRejected {
                requested: *requested,
                min: *min,
                max: *max,
            },
            Error::Configuration(m) => Error::Configuration(m.clone()),
            Error::Connection(m) => Error::Connection(m.clone()),
            Error::InvalidState(m) => Error::InvalidState(m.clone()),
            Error::QueueFull(n) => Error::QueueFull(*n),
            Error::Cancelled => Error::Cancelled,
        }
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
