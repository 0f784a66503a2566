//! Shared fixture: a minimal fake VST server good enough to drive the
//! end-to-end scenarios in the wire spec's testable properties. It speaks
//! just enough of the protocol — handshake, chunk framing, the request and
//! authentication envelope shapes — to stand in for a real database host.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use vst_core::envelope::{encode_response_envelope, Value};
use vst_core::model::HostDescription;
use vst_net::framing::{encode_message, Decoder};

/// One parsed incoming message, generic over the two envelope shapes a
/// server can receive (an application request, or an authentication
/// exchange).
pub enum Incoming {
    Auth { encryption: String, user: Option<String>, password: Option<String>, token: Option<String> },
    Request { method_code: i64, path: String, query: HashMap<String, String>, body: Vec<u8> },
}

pub struct FakeResponse {
    pub code: u16,
    pub meta: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl FakeResponse {
    pub fn code(code: u16) -> Self {
        Self { code, meta: HashMap::new(), body: Vec::new() }
    }

    pub fn with_body(code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { code, meta: HashMap::new(), body: body.into() }
    }
}

pub type Handler = Arc<dyn Fn(Incoming) -> FakeResponse + Send + Sync>;

/// A fake VST listener bound to an ephemeral local port, serving every
/// accepted connection with the same handler.
pub struct FakeVstServer {
    pub addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl FakeVstServer {
    pub async fn spawn(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake vst listener");
        let addr = listener.local_addr().expect("local addr");
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { return };
                let handler = handler.clone();
                tokio::spawn(serve_connection(stream, handler));
            }
        });
        Self { addr, accept_task }
    }

    pub fn host(&self) -> HostDescription {
        HostDescription::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn stop(&self) {
        self.accept_task.abort();
    }
}

impl Drop for FakeVstServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// A fake host that never accepts — stands in for an unreachable seed host
/// in the fallback-host scenario. Binds nothing; `host()` returns an
/// address nothing listens on.
pub fn unreachable_host() -> HostDescription {
    HostDescription::new("127.0.0.1", 1)
}

async fn serve_connection(mut stream: TcpStream, handler: Handler) {
    let mut handshake = [0u8; 11];
    if stream.read_exact(&mut handshake).await.is_err() {
        return;
    }

    let mut decoder = Decoder::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let messages = match decoder.feed(&buf[..n]) {
            Ok(messages) => messages,
            Err(_) => return,
        };
        for message in messages {
            let Some(incoming) = parse_incoming(&message.payload) else { continue };
            let response = handler(incoming);
            let mut payload = encode_response_envelope(response.code as i64, &response.meta);
            payload.extend_from_slice(&response.body);
            let Ok(chunks) = encode_message(message.message_id, &payload, 30_000) else { return };
            for chunk in &chunks {
                if stream.write_all(&chunk.to_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn parse_incoming(payload: &[u8]) -> Option<Incoming> {
    let (value, consumed) = Value::decode(payload).ok()?;
    let items = value.as_array()?;
    let message_type = items.get(1)?.as_int()?;

    match message_type {
        1 => {
            if items.len() != 7 {
                return None;
            }
            let method_code = items[3].as_int()?;
            let path = items[4].as_str()?.to_owned();
            let query = items[5].clone().into_string_map();
            let body = payload[consumed..].to_vec();
            Some(Incoming::Request { method_code, path, query, body })
        }
        1000 => {
            let encryption = items.get(2)?.as_str()?.to_owned();
            match encryption.as_str() {
                "plain" => Some(Incoming::Auth {
                    encryption,
                    user: items.get(3).and_then(Value::as_str).map(str::to_owned),
                    password: items.get(4).and_then(Value::as_str).map(str::to_owned),
                    token: None,
                }),
                "jwt" => Some(Incoming::Auth {
                    encryption,
                    user: None,
                    password: None,
                    token: items.get(3).and_then(Value::as_str).map(str::to_owned),
                }),
                _ => None,
            }
        }
        _ => None,
    }
}
