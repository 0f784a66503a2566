//! Graceful-close scenario: many concurrent executes in flight, then an
//! immediate `shutdown()`. Every in-flight call must still resolve, either
//! with a response or with a transport error reporting the closed
//! connection — none may hang.

use std::sync::Arc;

use vst_core::config::{AuthConfig, ConnectionConfig, DriverConfig, HostConfig, PoolConfig, Topology, TlsConfig};
use vst_core::model::Request;
use vst_core::wire::Method;
use vst_net::Driver;

use crate::infra::{FakeResponse, FakeVstServer, Incoming};

#[tokio::test]
async fn ten_concurrent_executes_all_resolve_across_an_immediate_close() {
    let handler = Arc::new(|incoming: Incoming| match incoming {
        Incoming::Auth { .. } => FakeResponse::code(200),
        Incoming::Request { .. } => FakeResponse::with_body(200, b"ok".to_vec()),
    });
    let server = FakeVstServer::spawn(handler).await;

    let config = DriverConfig {
        hosts: vec![HostConfig { host: server.addr.ip().to_string(), port: server.addr.port() }],
        pool: PoolConfig { connections_per_host: 1, topology: Topology::SingleServer, executor_fleet_size: 1 },
        connection: ConnectionConfig { operation_timeout_ms: 2_000, chunk_size_bytes: 30_000, ttl_ms: 0 },
        auth: AuthConfig::None,
        tls: TlsConfig::default(),
    };
    let driver = Arc::new(Driver::connect(&config).await.expect("driver connects"));

    let mut calls = Vec::new();
    for _ in 0..10 {
        let driver = driver.clone();
        calls.push(tokio::spawn(async move {
            let request = Request::builder(Method::Get, "/_api/version").build().unwrap();
            driver.execute(request).await
        }));
    }

    driver.shutdown().await;

    for call in calls {
        // Every awaitable must resolve one way or another; a panic here
        // (task never completing) is the failure this test guards against.
        let result = call.await.expect("execute task did not panic");
        match result {
            Ok(response) => assert_eq!(response.code, 200),
            Err(e) => assert!(e.resets_connection(), "unexpected error kind on close: {e}"),
        }
    }
}
