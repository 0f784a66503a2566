//! One VST connection: a bound executor, one socket, one message store.

mod actor;
mod handle;
mod state;
mod transport;

pub use handle::Connection;
pub use state::ConnectionState;
