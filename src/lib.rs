//! RTMP chunk stream transport.
//!
//! Turns an ordered byte stream into RTMP messages and back: chunk
//! encoding and reassembly with header compression, acknowledgement window
//! accounting, egress rate limiting and a prioritised send queue, driven by
//! a [`Connection`] with one sender and one receiver task.

mod utils;
mod amf;
mod protocol;
mod chunk;
mod message;
mod flow;
mod connection;

// Re-export commonly used types at crate root
pub use utils::*;
pub use amf::*;
pub use protocol::*;
pub use chunk::*;
pub use message::*;
pub use flow::*;
pub use connection::*;
