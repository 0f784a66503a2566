//! VST driver integration tests.
//!
//! Each module spins up one or more in-process fake VST listeners (plain
//! `tokio::net::TcpListener`, see `infra.rs`) speaking just enough of the
//! wire protocol to drive one end-to-end scenario from the wire spec's
//! testable properties. No real ArangoDB server is required.

mod infra;

mod auth;
mod chunking;
mod fallback_host;
mod graceful_close;
mod leader_failover;
