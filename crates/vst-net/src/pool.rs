//! Topology-aware connection pool — N connections per host, refreshed host
//! lists, and per-topology request routing.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use vst_core::config::{AuthConfig, ConnectionConfig, PoolConfig, TlsConfig, Topology};
use vst_core::error::{DriverError, DriverResult};
use vst_core::model::{HostDescription, Request, Response};
use vst_core::wire::Method;

use crate::connection::Connection;
use crate::scheduler::SchedulerPool;

const LEADER_PROBE_PATH: &str = "/_system/_api/database/current";

/// Maintains `connections_per_host` initialized connections per host and
/// routes requests according to the configured topology.
pub struct ConnectionPool {
    scheduler: Arc<SchedulerPool>,
    tls: TlsConfig,
    auth: AuthConfig,
    connection_config: ConnectionConfig,
    topology: Topology,
    connections_per_host: u32,
    connections: RwLock<HashMap<HostDescription, Vec<Connection>>>,
    /// Hosts in seed-list order, restricted to those currently holding
    /// connections. `find_leader` probes in this order so "the first host
    /// whose response is not 503" is deterministic rather than following
    /// `HashMap` iteration order.
    host_order: RwLock<Vec<HostDescription>>,
    leader: RwLock<Option<HostDescription>>,
}

impl ConnectionPool {
    pub fn new(scheduler: Arc<SchedulerPool>, pool_config: &PoolConfig, connection_config: ConnectionConfig, auth: AuthConfig, tls: TlsConfig) -> Self {
        Self {
            scheduler,
            tls,
            auth,
            connection_config,
            topology: pool_config.topology,
            connections_per_host: pool_config.connections_per_host.max(1),
            connections: RwLock::new(HashMap::new()),
            host_order: RwLock::new(Vec::new()),
            leader: RwLock::new(None),
        }
    }

    /// Reconciles the pool's host set against `hosts`: adds and initializes
    /// connections for new hosts, closes and drops connections for removed
    /// ones. A host whose connections fail to initialize is not added —
    /// its error is logged and the update continues for the remaining
    /// hosts.
    pub async fn update_connections(&self, hosts: &[HostDescription]) {
        let (additions, removals) = {
            let current = self.connections.read().await;
            let additions: Vec<HostDescription> =
                hosts.iter().filter(|h| !current.contains_key(*h)).cloned().collect();
            let removals: Vec<HostDescription> =
                current.keys().filter(|h| !hosts.contains(h)).cloned().collect();
            (additions, removals)
        };

        let added: Vec<(HostDescription, DriverResult<Vec<Connection>>)> =
            futures::future::join_all(additions.into_iter().map(|host| async move {
                let result = self.initialize_host(&host).await;
                (host, result)
            }))
            .await;

        let removed: Vec<Vec<Connection>> = {
            let mut current = self.connections.write().await;
            removals
                .into_iter()
                .filter_map(|host| current.remove(&host))
                .collect()
        };
        futures::future::join_all(removed.into_iter().flatten().map(|c| async move {
            let _ = c.close().await;
        }))
        .await;

        {
            let mut current = self.connections.write().await;
            for (host, result) in added {
                match result {
                    Ok(conns) => {
                        current.insert(host, conns);
                    }
                    Err(e) => {
                        tracing::warn!(host = %host, error = %e, "failed to initialize host, skipping");
                    }
                }
            }
            let mut order = self.host_order.write().await;
            *order = hosts.iter().filter(|h| current.contains_key(*h)).cloned().collect();
        }

        if self.topology == Topology::ActiveFailover {
            self.find_leader().await;
        }
    }

    async fn initialize_host(&self, host: &HostDescription) -> DriverResult<Vec<Connection>> {
        let attempts = futures::future::join_all((0..self.connections_per_host).map(|_| async move {
            let conn = Connection::new(
                &self.scheduler.next_handle(),
                host.clone(),
                self.tls.clone(),
                self.auth.clone(),
                self.connection_config.chunk_size_bytes,
                self.connection_config.operation_timeout(),
                self.connection_config.ttl(),
            );
            conn.initialize().await?;
            Ok::<_, DriverError>(conn)
        }))
        .await;

        attempts.into_iter().collect()
    }

    /// Closes every connection to every host. Safe to call more than once.
    pub async fn shutdown(&self) {
        let hosts: Vec<Vec<Connection>> = {
            let mut current = self.connections.write().await;
            current.drain().map(|(_, conns)| conns).collect()
        };
        futures::future::join_all(hosts.into_iter().flatten().map(|c| async move {
            let _ = c.close().await;
        }))
        .await;
        self.host_order.write().await.clear();
        *self.leader.write().await = None;
    }

    /// Routes `request` per the configured topology.
    pub async fn execute(&self, request: Request) -> DriverResult<Response> {
        match self.topology {
            Topology::SingleServer | Topology::Cluster => self.execute_on_random_host(request).await,
            Topology::ActiveFailover => self.execute_on_leader(request).await,
        }
    }

    async fn execute_on_random_host(&self, request: Request) -> DriverResult<Response> {
        let connection = {
            let current = self.connections.read().await;
            let hosts: Vec<&HostDescription> = current.keys().collect();
            let host = hosts
                .choose(&mut rand::thread_rng())
                .ok_or_else(|| DriverError::transport("no hosts available in the pool"))?;
            let candidates = &current[*host];
            candidates
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| DriverError::transport("host has no initialized connections"))?
        };
        connection.execute(request).await
    }

    async fn execute_on_leader(&self, request: Request) -> DriverResult<Response> {
        let leader = self.leader.read().await.clone();
        let Some(leader) = leader else {
            return Err(DriverError::transport("no known ACTIVE_FAILOVER leader"));
        };

        let connection = {
            let current = self.connections.read().await;
            let candidates = current
                .get(&leader)
                .ok_or_else(|| DriverError::transport("leader host is no longer in the pool"))?;
            candidates
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| DriverError::transport("leader host has no initialized connections"))?
        };

        let response = connection.execute(request).await?;
        if response.code == 503 {
            self.find_leader().await;
        }
        Ok(response)
    }

    /// Probes each host's first connection with `GET /_system/_api/database/current`,
    /// in seed-list order. The first host whose response is not 503 becomes
    /// the leader; if none succeed the leader is cleared.
    async fn find_leader(&self) {
        let probes: Vec<(HostDescription, Connection)> = {
            let order = self.host_order.read().await;
            let current = self.connections.read().await;
            order
                .iter()
                .filter_map(|host| current.get(host).and_then(|conns| conns.first()).map(|c| (host.clone(), c.clone())))
                .collect()
        };

        for (host, connection) in probes {
            let probe = match Request::builder(Method::Get, LEADER_PROBE_PATH).build() {
                Ok(r) => r,
                Err(_) => continue,
            };
            match connection.execute(probe).await {
                Ok(response) if response.code != 503 => {
                    tracing::info!(host = %host, "leader discovered");
                    *self.leader.write().await = Some(host);
                    return;
                }
                Ok(response) => {
                    tracing::debug!(host = %host, code = response.code, "host declined leader probe");
                }
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "leader probe failed");
                }
            }
        }

        tracing::warn!("no host answered the leader probe, clearing leader");
        *self.leader.write().await = None;
    }

    /// Number of hosts currently holding at least one initialized
    /// connection. Exposed for tests and diagnostics.
    pub async fn host_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn current_leader(&self) -> Option<HostDescription> {
        self.leader.read().await.clone()
    }
}
