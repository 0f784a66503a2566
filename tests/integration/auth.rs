//! Bad-password scenario: a wrong credential must fail host initialization
//! with an authentication error, and the host must not be advertised as
//! usable afterwards.

use std::sync::Arc;

use vst_core::config::{AuthConfig, ConnectionConfig, DriverConfig, HostConfig, PoolConfig, Topology, TlsConfig};
use vst_net::Driver;

use crate::infra::{FakeResponse, FakeVstServer, Incoming};

#[tokio::test]
async fn bad_password_fails_initialization_and_leaves_no_usable_host() {
    let handler = Arc::new(|incoming: Incoming| match incoming {
        Incoming::Auth { user: Some(u), password: Some(p), .. } if u == "root" && p == "correct" => {
            FakeResponse::code(200)
        }
        Incoming::Auth { .. } => FakeResponse::code(401),
        Incoming::Request { .. } => FakeResponse::code(200),
    });
    let server = FakeVstServer::spawn(handler).await;

    let config = DriverConfig {
        hosts: vec![HostConfig { host: server.addr.ip().to_string(), port: server.addr.port() }],
        pool: PoolConfig { connections_per_host: 1, topology: Topology::SingleServer, executor_fleet_size: 1 },
        connection: ConnectionConfig { operation_timeout_ms: 2_000, chunk_size_bytes: 30_000, ttl_ms: 0 },
        auth: AuthConfig::Basic { user: "root".to_owned(), password: "wrong".to_owned() },
        tls: TlsConfig::default(),
    };

    // `Driver::connect` never fails outright on a bad host: it logs the
    // failure and carries on, so the only host simply never shows up in the
    // pool.
    let driver = Driver::connect(&config).await.expect("connect itself does not fail");
    assert_eq!(driver.active_host_count().await, 0, "the only host failed auth and must not be advertised");
}
