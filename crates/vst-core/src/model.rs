//! Request/Response records.
//!
//! Plain immutable value types, constructed once and never mutated — the
//! re-expression of the source driver's builder/immutables pattern. All
//! validation happens at construction time via `Request::builder()`.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::DriverError;
use crate::wire::{Method, PROTOCOL_VERSION};

/// An immutable (host, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostDescription {
    pub host: String,
    pub port: u16,
}

impl HostDescription {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl std::fmt::Display for HostDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An outgoing VST request. Construct via `Request::builder()`.
#[derive(Debug, Clone)]
pub struct Request {
    pub version: i64,
    pub database: String,
    pub method: Method,
    pub path: String,
    pub query_params: HashMap<String, String>,
    pub header_params: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }
}

pub struct RequestBuilder {
    database: String,
    method: Method,
    path: String,
    query_params: HashMap<String, String>,
    header_params: HashMap<String, String>,
    body: Bytes,
}

impl RequestBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            database: "_system".to_owned(),
            method,
            path: path.into(),
            query_params: HashMap::new(),
            header_params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_params.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Validates the path is non-empty (the only invariant the source
    /// driver enforces before handing a request to the wire).
    pub fn build(self) -> Result<Request, DriverError> {
        if self.path.is_empty() {
            return Err(DriverError::usage("request path must not be empty"));
        }
        Ok(Request {
            version: PROTOCOL_VERSION,
            database: self.database,
            method: self.method,
            path: self.path,
            query_params: self.query_params,
            header_params: self.header_params,
            body: self.body,
        })
    }
}

/// An incoming VST response. The caller owns `body`.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: i64,
    pub code: u16,
    pub meta: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}
