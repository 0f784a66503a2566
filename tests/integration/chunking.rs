//! Chunking-boundary scenario: with a small chunk size, a single request's
//! payload must be split on the wire into exactly the chunks the framing
//! codec's encode function would produce, with the prescribed `chunk_x`
//! pattern — verified here against raw bytes read directly off the socket,
//! not through the driver's own decoder.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vst_core::config::{AuthConfig, ConnectionConfig, DriverConfig, HostConfig, PoolConfig, Topology, TlsConfig};
use vst_core::envelope::{encode_request_envelope, encode_response_envelope};
use vst_core::model::Request;
use vst_core::wire::Method;
use vst_net::framing::encode_message;
use vst_net::Driver;

struct RawChunk {
    chunk_x: u32,
    message_id: u64,
    message_length: u64,
    content_len: usize,
}

async fn read_one_chunk(stream: &mut TcpStream) -> RawChunk {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let length = u32::from_le_bytes(len_buf) as usize;
    let mut rest = vec![0u8; length - 4];
    stream.read_exact(&mut rest).await.unwrap();
    RawChunk {
        chunk_x: u32::from_le_bytes(rest[0..4].try_into().unwrap()),
        message_id: u64::from_le_bytes(rest[4..12].try_into().unwrap()),
        message_length: u64::from_le_bytes(rest[12..20].try_into().unwrap()),
        content_len: rest.len() - 20,
    }
}

async fn respond_ok(stream: &mut TcpStream, message_id: u64) {
    let payload = encode_response_envelope(200, &Default::default());
    let chunks = encode_message(message_id, &payload, 30_000).unwrap();
    for chunk in &chunks {
        stream.write_all(&chunk.to_bytes()).await.unwrap();
    }
}

#[tokio::test]
async fn hundred_byte_payload_with_chunk_size_30_makes_four_chunks_on_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut handshake = [0u8; 11];
        stream.read_exact(&mut handshake).await.unwrap();

        // The no-auth probe sent during initialize().
        let probe = read_one_chunk(&mut stream).await;
        respond_ok(&mut stream, probe.message_id).await;

        // The real request: capture every chunk until the whole message has
        // arrived.
        let mut chunks = Vec::new();
        let mut received = 0u64;
        loop {
            let chunk = read_one_chunk(&mut stream).await;
            received += chunk.content_len as u64;
            let message_id = chunk.message_id;
            let message_length = chunk.message_length;
            chunks.push(chunk);
            if received >= message_length {
                respond_ok(&mut stream, message_id).await;
                break;
            }
        }
        chunks
    });

    let request_no_body = Request::builder(Method::Get, "/_api/version").build().unwrap();
    let envelope_len = encode_request_envelope(&request_no_body).len();
    let body_len = 100usize.saturating_sub(envelope_len);
    let request = Request::builder(Method::Get, "/_api/version")
        .body(vec![0xABu8; body_len])
        .build()
        .unwrap();

    let config = DriverConfig {
        hosts: vec![HostConfig { host: addr.ip().to_string(), port: addr.port() }],
        pool: PoolConfig { connections_per_host: 1, topology: Topology::SingleServer, executor_fleet_size: 1 },
        connection: ConnectionConfig { operation_timeout_ms: 2_000, chunk_size_bytes: 30, ttl_ms: 0 },
        auth: AuthConfig::None,
        tls: TlsConfig::default(),
    };
    let driver = Driver::connect(&config).await.expect("driver connects");
    let response = driver.execute(request).await.expect("request completes");
    assert_eq!(response.code, 200);
    driver.shutdown().await;

    let chunks = server.await.expect("server task did not panic");
    assert_eq!(chunks.len(), 4);
    for chunk in &chunks {
        assert_eq!(chunk.message_length, 100);
    }
    let chunk_x: Vec<u32> = chunks.iter().map(|c| c.chunk_x).collect();
    assert_eq!(chunk_x, vec![9, 2, 4, 6]);
}
