//! vst-net — the connection actor, framing codec, message store, scheduler
//! pool, and topology-aware connection pool that sit between `vst-core`'s
//! wire types and a caller's requests.

pub mod connection;
pub mod facade;
pub mod framing;
pub mod message_store;
pub mod pool;
pub mod scheduler;

pub use connection::{Connection, ConnectionState};
pub use facade::Driver;
pub use pool::ConnectionPool;
pub use scheduler::SchedulerPool;
