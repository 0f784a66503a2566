//! Public handle to a connection actor.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use vst_core::config::{AuthConfig, TlsConfig};
use vst_core::error::{DriverError, DriverResult};
use vst_core::model::{HostDescription, Request, Response};

use crate::message_store::MessageStore;

use super::actor::{Command, ConnectionActor};

/// A single VST connection, bound to one executor in the scheduler's fleet.
///
/// Cheap to clone: every clone shares the same mailbox and underlying
/// socket. `initialize()` must complete successfully before `execute()` is
/// called; both return a `DriverError::Usage` otherwise.
#[derive(Clone)]
pub struct Connection {
    mailbox: mpsc::Sender<Command>,
    operation_timeout: Duration,
    pub(crate) host: HostDescription,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: &tokio::runtime::Handle,
        host: HostDescription,
        tls: TlsConfig,
        auth: AuthConfig,
        chunk_size: u32,
        operation_timeout: Duration,
        ttl: Option<Duration>,
    ) -> Self {
        let message_store = MessageStore::new();
        let mailbox = ConnectionActor::spawn(
            executor,
            host.clone(),
            tls,
            auth,
            chunk_size,
            operation_timeout,
            ttl,
            message_store.clone(),
        );
        Self { mailbox, operation_timeout, host }
    }

    /// Connects the socket and, if configured, authenticates. Must be
    /// called exactly once before `execute()`.
    pub async fn initialize(&self) -> DriverResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Initialize { respond_to: tx }).await?;
        self.await_reply(rx).await?
    }

    /// Sends one request and awaits its response, bounded by the
    /// connection's configured operation timeout. The message id is
    /// allocated on the bound executor (see `ConnectionActor::do_execute`),
    /// not here, so it can be reset to 0 on every disconnect.
    pub async fn execute(&self, request: Request) -> DriverResult<Response> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Execute { request, respond_to: ack_tx }).await?;
        let (message_id, response_rx) = self.await_reply(ack_rx).await??;

        match tokio::time::timeout(self.operation_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DriverError::transport("connection closed before responding")),
            Err(_) => {
                tracing::warn!(message_id, timeout = ?self.operation_timeout, "execute timed out, resetting connection");
                // Drive the reset through the bound executor so it actually
                // tears the connection down (DISCONNECTED, session
                // discarded, every other pending completion failed, message
                // id counter reset to 0) instead of only dropping this one
                // caller's completion slot.
                self.reset_after_timeout().await;
                Err(DriverError::Timeout(self.operation_timeout))
            }
        }
    }

    async fn reset_after_timeout(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::TimedOut { respond_to: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Gracefully shuts down the socket and stops the actor. Idempotent.
    pub async fn close(&self) -> DriverResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Close { respond_to: tx }).await.is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    async fn send(&self, cmd: Command) -> DriverResult<()> {
        self.mailbox
            .send(cmd)
            .await
            .map_err(|_| DriverError::transport("connection actor is no longer running"))
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<T>) -> DriverResult<T> {
        rx.await.map_err(|_| DriverError::transport("connection actor dropped the reply channel"))
    }
}
