//! Communication façade — the one type application code talks to. Resolves
//! the initial host list, builds the scheduler fleet and connection pool,
//! and exposes `execute`/`shutdown`.

use std::sync::Arc;

use vst_core::config::DriverConfig;
use vst_core::error::DriverResult;
use vst_core::model::{HostDescription, Request, Response};

use crate::pool::ConnectionPool;
use crate::scheduler::SchedulerPool;

/// The top-level entry point for a VST driver instance.
///
/// Construct once via [`Driver::connect`], issue requests with
/// [`Driver::execute`], and call [`Driver::shutdown`] when done — it is
/// safe to call `shutdown` more than once.
pub struct Driver {
    pool: ConnectionPool,
}

impl Driver {
    /// Resolves the configured hosts, builds the executor fleet and
    /// connection pool, and brings up the configured number of connections
    /// per host before returning.
    pub async fn connect(config: &DriverConfig) -> DriverResult<Self> {
        let scheduler = Arc::new(SchedulerPool::new(config.pool.executor_fleet_size)?);
        let pool = ConnectionPool::new(
            scheduler,
            &config.pool,
            config.connection.clone(),
            config.auth.clone(),
            config.tls.clone(),
        );

        let hosts: Vec<HostDescription> = config.hosts.iter().map(HostDescription::from).collect();
        pool.update_connections(&hosts).await;

        tracing::info!(
            hosts = hosts.len(),
            topology = ?config.pool.topology,
            "vst driver connected"
        );

        Ok(Self { pool })
    }

    /// Executes one request, routed by the pool according to the
    /// configured topology.
    pub async fn execute(&self, request: Request) -> DriverResult<Response> {
        self.pool.execute(request).await
    }

    /// Refreshes the pool's host list to exactly `hosts`, adding and
    /// removing connections as needed.
    pub async fn update_hosts(&self, hosts: &[HostDescription]) {
        self.pool.update_connections(hosts).await;
    }

    /// Closes every connection. Idempotent.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    /// Number of hosts currently contributing at least one live connection.
    pub async fn active_host_count(&self) -> usize {
        self.pool.host_count().await
    }
}
