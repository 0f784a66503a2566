//! Driver error taxonomy.
//!
//! `ServerError` is intentionally absent here — a non-2xx response code is
//! surfaced to the caller as an ordinary `Response`, never as a `DriverError`
//! (see the VST wire spec's error handling section).

use std::sync::Arc;

/// Every error the driver itself can raise, as opposed to an error response
/// returned by the server.
///
/// `Clone` is required: `MessageStore::clear` fans the same error out to
/// every pending completion, and `std::io::Error` is not `Clone`, so I/O
/// failures are captured through an `Arc` instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    /// TCP connect failure, socket closed mid-stream, write/read aborted,
    /// TLS handshake failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// An I/O error observed directly on the socket.
    #[error("transport error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    /// The overall operation (initialize/execute/close) exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Malformed chunk header, unknown message id on a non-first chunk, or
    /// content that would overflow the assembly buffer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// VST authentication response code != 200, or the no-auth probe came
    /// back 401.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Synchronous usage error: `initialize()` called twice, `execute()`
    /// after `close()`.
    #[error("usage error: {0}")]
    Usage(String),
}

impl DriverError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// True for errors that should trigger a connection reset (transport,
    /// timeout, protocol) as opposed to synchronous usage errors.
    pub fn resets_connection(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_) | Self::Timeout(_) | Self::Protocol(_))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
