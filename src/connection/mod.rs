mod config;
mod connection;
mod receiver;
mod sender;
mod state;
mod transport;

pub use config::*;
pub use connection::*;
pub use state::*;
pub use transport::*;
