mod control;
mod handler;
mod queue;
mod types;

pub use control::*;
pub use handler::*;
pub use queue::*;
pub use types::*;
