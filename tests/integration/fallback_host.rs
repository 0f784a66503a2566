//! Fallback-host scenario: the first configured host is unreachable; the
//! pool still brings up a usable connection against the second.

use std::sync::Arc;

use vst_core::config::{AuthConfig, ConnectionConfig, DriverConfig, HostConfig, PoolConfig, Topology, TlsConfig};
use vst_core::model::Request;
use vst_core::wire::Method;
use vst_net::Driver;

use crate::infra::{unreachable_host, FakeResponse, FakeVstServer, Incoming};

#[tokio::test]
async fn unreachable_first_host_does_not_block_the_reachable_second() {
    let handler = Arc::new(|incoming: Incoming| match incoming {
        Incoming::Auth { .. } => FakeResponse::code(200),
        Incoming::Request { path, .. } if path == "/_api/version" => {
            FakeResponse::with_body(200, br#"{"version":"3.11.0"}"#.to_vec())
        }
        Incoming::Request { .. } => FakeResponse::code(404),
    });
    let server = FakeVstServer::spawn(handler).await;
    let dead = unreachable_host();

    let config = DriverConfig {
        hosts: vec![
            HostConfig { host: dead.host.clone(), port: dead.port },
            HostConfig { host: server.addr.ip().to_string(), port: server.addr.port() },
        ],
        pool: PoolConfig { connections_per_host: 1, topology: Topology::SingleServer, executor_fleet_size: 1 },
        connection: ConnectionConfig { operation_timeout_ms: 2_000, chunk_size_bytes: 30_000, ttl_ms: 0 },
        auth: AuthConfig::None,
        tls: TlsConfig::default(),
    };

    let driver = Driver::connect(&config).await.expect("driver connects");
    assert_eq!(driver.active_host_count().await, 1, "only the reachable host should be in the pool");

    let request = Request::builder(Method::Get, "/_api/version").build().unwrap();
    let response = driver.execute(request).await.expect("request reaches the reachable host");
    assert_eq!(response.code, 200);

    driver.shutdown().await;
}
