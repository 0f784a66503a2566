//! vst-core — shared wire types, the request/response data model, the
//! driver error taxonomy, and configuration. Every other VST driver crate
//! depends on this one.

pub mod config;
pub mod envelope;
pub mod error;
pub mod model;
pub mod wire;

pub use error::{DriverError, DriverResult};
pub use model::{HostDescription, Request, RequestBuilder, Response};
