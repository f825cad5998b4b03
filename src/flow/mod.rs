mod ack_mode;
mod token_bucket;
mod window;

pub use ack_mode::*;
pub use token_bucket::*;
pub use window::*;
