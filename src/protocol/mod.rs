mod packet;
mod command;
mod data;
mod ids;
pub mod constants;

pub use packet::*;
pub use command::*;
pub use data::*;
pub use ids::*;
pub use constants::*;
