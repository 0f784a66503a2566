//! ACTIVE_FAILOVER scenario: three hosts, one leader. A 503 from the
//! current leader must trigger a leader re-probe, and the next request must
//! land on whichever host now answers successfully.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use vst_core::config::{AuthConfig, ConnectionConfig, DriverConfig, HostConfig, PoolConfig, Topology, TlsConfig};
use vst_core::model::Request;
use vst_core::wire::Method;
use vst_net::Driver;

use crate::infra::{FakeResponse, FakeVstServer, Incoming};

#[tokio::test]
async fn leader_503_triggers_refresh_and_routes_to_the_new_leader() {
    // h1 is the leader until it starts failing; h2 takes over; h3 never
    // answers the leader probe successfully.
    let h1_failing = Arc::new(AtomicU32::new(0));
    let h1_flag = h1_failing.clone();
    let h1 = FakeVstServer::spawn(Arc::new(move |incoming: Incoming| match incoming {
        Incoming::Auth { .. } => FakeResponse::code(200),
        Incoming::Request { .. } => {
            if h1_flag.load(Ordering::SeqCst) == 0 {
                FakeResponse::with_body(200, b"h1".to_vec())
            } else {
                FakeResponse::code(503)
            }
        }
    }))
    .await;

    let h2 = FakeVstServer::spawn(Arc::new(|incoming: Incoming| match incoming {
        Incoming::Auth { .. } => FakeResponse::code(200),
        Incoming::Request { .. } => FakeResponse::with_body(200, b"h2".to_vec()),
    }))
    .await;

    let h3 = FakeVstServer::spawn(Arc::new(|incoming: Incoming| match incoming {
        Incoming::Auth { .. } => FakeResponse::code(200),
        Incoming::Request { .. } => FakeResponse::code(503),
    }))
    .await;

    let config = DriverConfig {
        hosts: vec![
            HostConfig { host: h1.addr.ip().to_string(), port: h1.addr.port() },
            HostConfig { host: h2.addr.ip().to_string(), port: h2.addr.port() },
            HostConfig { host: h3.addr.ip().to_string(), port: h3.addr.port() },
        ],
        pool: PoolConfig { connections_per_host: 1, topology: Topology::ActiveFailover, executor_fleet_size: 1 },
        connection: ConnectionConfig { operation_timeout_ms: 2_000, chunk_size_bytes: 30_000, ttl_ms: 0 },
        auth: AuthConfig::None,
        tls: TlsConfig::default(),
    };
    let driver = Driver::connect(&config).await.expect("driver connects");
    assert_eq!(driver.active_host_count().await, 3);

    let request = Request::builder(Method::Get, "/_api/version").build().unwrap();
    let response = driver.execute(request).await.expect("first request succeeds against the initial leader");
    assert_eq!(response.body.as_ref(), b"h1");

    // h1 starts failing; the next request observes the 503, triggers a
    // leader refresh, and the probe must land on h2 (h3 always 503s).
    h1_failing.store(1, Ordering::SeqCst);
    let request = Request::builder(Method::Get, "/_api/version").build().unwrap();
    let response = driver.execute(request).await.expect("second request still succeeds after failover");
    assert_eq!(response.code, 503, "the call that observes the failing leader surfaces its 503 response");

    // The refresh triggered by the 503 above has already run by the time
    // `execute` returns; a fresh request now goes straight to the new
    // leader.
    let request = Request::builder(Method::Get, "/_api/version").build().unwrap();
    let response = driver.execute(request).await.expect("third request is routed to the failed-over leader");
    assert_eq!(response.body.as_ref(), b"h2");

    driver.shutdown().await;
}
