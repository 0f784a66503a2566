//! The connection actor — owns one TCP/TLS socket and the single-thread
//! executor it is bound to. All socket I/O happens here; callers only ever
//! talk to it through its mailbox (see `handle.rs`).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use vst_core::config::{AuthConfig, TlsConfig};
use vst_core::envelope::{decode_response_envelope, encode_auth_basic, encode_auth_jwt, encode_request_envelope};
use vst_core::error::{DriverError, DriverResult};
use vst_core::model::{HostDescription, Request, Response};
use vst_core::wire::{Method, HANDSHAKE};

use crate::framing::{encode_message, DecodedMessage, Decoder};
use crate::message_store::MessageStore;

use super::state::ConnectionState;
use super::transport::{self, BoxedWrite};

/// The reserved message id for the authentication exchange (or the no-auth
/// probe) performed during `initialize()`, before any application request
/// is in flight.
const AUTH_MESSAGE_ID: u64 = 0;

/// Probed when no authentication method is configured, to surface a
/// misconfigured server (one that actually requires auth) as an
/// authentication error rather than a confusing later 401.
const NO_AUTH_PROBE_PATH: &str = "/_system/_api/cluster/endpoints";

type ExecuteReply = DriverResult<(u64, oneshot::Receiver<DriverResult<Response>>)>;

pub(crate) enum Command {
    Initialize { respond_to: oneshot::Sender<DriverResult<()>> },
    Execute { request: Request, respond_to: oneshot::Sender<ExecuteReply> },
    /// Sent by the handle when its end-to-end deadline on an in-flight
    /// `execute()` elapses. Runs `handle_error` on the bound executor so the
    /// timeout resets the connection the same way a write/read error would,
    /// instead of leaving the session and message id counter untouched.
    TimedOut { respond_to: oneshot::Sender<()> },
    Close { respond_to: oneshot::Sender<()> },
}

pub(crate) struct ConnectionActor {
    host: HostDescription,
    tls: TlsConfig,
    auth: AuthConfig,
    chunk_size: u32,
    operation_timeout: std::time::Duration,
    ttl: Option<std::time::Duration>,
    mailbox: mpsc::Receiver<Command>,
    message_store: MessageStore,
    state: ConnectionState,
    connected_at: Option<std::time::Instant>,
    /// `false` until `initialize()` succeeds once; a second call is
    /// rejected even after the connection later drops and reconnects via
    /// `execute()`.
    initialized: bool,
    /// The message id counter. Incremented-then-read, so the first id
    /// allocated is 1; reset to 0 on every disconnect so the next
    /// allocation after a reconnect again yields 1.
    next_message_id: u64,
}

impl ConnectionActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        executor: &tokio::runtime::Handle,
        host: HostDescription,
        tls: TlsConfig,
        auth: AuthConfig,
        chunk_size: u32,
        operation_timeout: std::time::Duration,
        ttl: Option<std::time::Duration>,
        message_store: MessageStore,
    ) -> mpsc::Sender<Command> {
        let (tx, rx) = mpsc::channel(64);
        let actor = ConnectionActor {
            host,
            tls,
            auth,
            chunk_size,
            operation_timeout,
            ttl,
            mailbox: rx,
            message_store,
            state: ConnectionState::Disconnected,
            connected_at: None,
            initialized: false,
            next_message_id: 0,
        };
        // Binds the actor (and every task it spawns in turn, like the
        // reader loop) to one single-thread executor for the lifetime of
        // the connection.
        executor.spawn(actor.run());
        tx
    }

    async fn run(mut self) {
        let mut writer: Option<BoxedWrite> = None;
        let mut decoder_rx: Option<mpsc::Receiver<DecodedMessage>> = None;

        loop {
            tokio::select! {
                cmd = self.mailbox.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!(host = %self.host, "connection handle dropped, shutting down actor");
                        break;
                    };
                    if self.handle_command(cmd, &mut writer, &mut decoder_rx).await {
                        break;
                    }
                }

                decoded = recv_from(&mut decoder_rx) => {
                    match decoded {
                        Some(message) => self.message_store.resolve(message.message_id, &message.payload),
                        None => {
                            self.handle_error(&mut writer, &mut decoder_rx, DriverError::transport("connection lost")).await;
                        }
                    }
                }
            }
        }

        self.message_store.clear(DriverError::transport("connection closed"));
    }

    /// Returns `true` when the actor should stop running.
    async fn handle_command(
        &mut self,
        cmd: Command,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
    ) -> bool {
        match cmd {
            Command::Initialize { respond_to } => {
                let result = self.do_initialize(writer, decoder_rx).await;
                let _ = respond_to.send(result);
                false
            }
            Command::Execute { request, respond_to } => {
                let result = self.do_execute(writer, decoder_rx, &request).await;
                let _ = respond_to.send(result);
                false
            }
            Command::TimedOut { respond_to } => {
                self.handle_error(writer, decoder_rx, DriverError::Timeout(self.operation_timeout)).await;
                let _ = respond_to.send(());
                false
            }
            Command::Close { respond_to } => {
                self.state = ConnectionState::Closed;
                if let Some(mut w) = writer.take() {
                    let _ = w.shutdown().await;
                }
                let _ = respond_to.send(());
                true
            }
        }
    }

    async fn do_initialize(
        &mut self,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
    ) -> DriverResult<()> {
        if self.initialized {
            return Err(DriverError::usage("initialize called more than once"));
        }
        self.initialized = true;
        self.connect_and_handshake(writer, decoder_rx).await
    }

    /// The connect/handshake/authenticate sequence, shared by the public
    /// `initialize()` entry point and the implicit reconnect `execute()`
    /// triggers when it observes a DISCONNECTED connection.
    async fn connect_and_handshake(
        &mut self,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
    ) -> DriverResult<()> {
        self.state = ConnectionState::Connecting;

        let (mut read_half, mut write_half) = transport::connect(&self.host, &self.tls).await?;
        write_half.write_all(HANDSHAKE).await.map_err(DriverError::from)?;

        let (msg_tx, msg_rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut decoder = Decoder::new();
            let mut buf = vec![0u8; 8192];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => return,
                    Ok(n) => match decoder.feed(&buf[..n]) {
                        Ok(messages) => {
                            for message in messages {
                                if msg_tx.send(message).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "chunk decode error, closing read side");
                            return;
                        }
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "socket read error, closing read side");
                        return;
                    }
                }
            }
        });

        *decoder_rx = Some(msg_rx);
        *writer = Some(write_half);

        self.state = ConnectionState::Authenticating;
        if let Err(e) = self.authenticate(writer, decoder_rx).await {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Ready;
        self.connected_at = Some(std::time::Instant::now());
        Ok(())
    }

    /// Tears the current session down: fails every pending completion,
    /// drops the socket and reader, and returns to DISCONNECTED. A no-op if
    /// already DISCONNECTED or CLOSED.
    async fn handle_error(
        &mut self,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
        error: DriverError,
    ) {
        if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Closed) {
            return;
        }
        tracing::warn!(host = %self.host, error = %error, "connection error, resetting");
        self.state = ConnectionState::Disconnected;
        self.connected_at = None;
        self.next_message_id = 0;
        *writer = None;
        *decoder_rx = None;
        self.message_store.clear(error);
    }

    async fn authenticate(
        &mut self,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
    ) -> DriverResult<()> {
        let envelope = match &self.auth {
            AuthConfig::None => {
                let probe = Request::builder(Method::Get, NO_AUTH_PROBE_PATH)
                    .build()
                    .expect("the probe path is a non-empty constant");
                let mut payload = encode_request_envelope(&probe);
                payload.extend_from_slice(&probe.body);
                self.write_message(writer, AUTH_MESSAGE_ID, &payload).await?;
                let response = self.await_envelope_response(decoder_rx).await?;
                if response.code == 401 {
                    return Err(DriverError::authentication(
                        "server requires authentication but none is configured",
                    ));
                }
                return Ok(());
            }
            AuthConfig::Basic { user, password } => encode_auth_basic(user, password),
            AuthConfig::Jwt { token } => encode_auth_jwt(token),
        };

        self.write_message(writer, AUTH_MESSAGE_ID, &envelope).await?;
        let response = self.await_envelope_response(decoder_rx).await?;
        if response.code != 200 {
            return Err(DriverError::authentication(format!(
                "server rejected credentials (code {})",
                response.code
            )));
        }
        Ok(())
    }

    /// Awaits and parses the single response expected during `initialize()`
    /// (the auth exchange or the no-auth probe), bounded by the operation
    /// timeout.
    async fn await_envelope_response(
        &self,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
    ) -> DriverResult<vst_core::envelope::ParsedResponseEnvelope> {
        let rx = decoder_rx
            .as_mut()
            .expect("decoder channel is set up before authenticate() runs");
        let decoded = tokio::time::timeout(self.operation_timeout, rx.recv())
            .await
            .map_err(|_| DriverError::Timeout(self.operation_timeout))?
            .ok_or_else(|| DriverError::transport("connection closed during initialization"))?;
        let (response, _) = decode_response_envelope(&decoded.payload)?;
        Ok(response)
    }

    /// Implements the `execute()` step sequence in order: TTL-triggered
    /// teardown, ensure CONNECTED (reconnecting if necessary), allocate a
    /// message id, register a completion, encode and write.
    async fn do_execute(
        &mut self,
        writer: &mut Option<BoxedWrite>,
        decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>,
        request: &Request,
    ) -> ExecuteReply {
        if self.state == ConnectionState::Closed {
            return Err(DriverError::usage("execute called after close"));
        }

        if self.state == ConnectionState::Ready {
            if let (Some(ttl), Some(connected_at)) = (self.ttl, self.connected_at) {
                if connected_at.elapsed() >= ttl {
                    self.handle_error(writer, decoder_rx, DriverError::transport("connection ttl expired")).await;
                }
            }
        }

        if self.state == ConnectionState::Disconnected {
            self.connect_and_handshake(writer, decoder_rx).await?;
        }

        self.next_message_id += 1;
        let message_id = self.next_message_id;
        let response_rx = self.message_store.add_request(message_id);

        let mut payload = encode_request_envelope(request);
        payload.extend_from_slice(&request.body);
        if let Err(e) = self.write_message(writer, message_id, &payload).await {
            // A write error resets the whole connection, per the wire
            // spec's error handling: every other pending completion on
            // this connection is failed too, not just this one.
            self.handle_error(writer, decoder_rx, e.clone()).await;
            return Err(e);
        }
        Ok((message_id, response_rx))
    }

    async fn write_message(&self, writer: &mut Option<BoxedWrite>, message_id: u64, payload: &[u8]) -> DriverResult<()> {
        let writer = writer.as_mut().ok_or_else(|| DriverError::transport("not connected"))?;
        let chunks = encode_message(message_id, payload, self.chunk_size)?;
        for chunk in &chunks {
            writer.write_all(&chunk.to_bytes()).await.map_err(DriverError::from)?;
        }
        Ok(())
    }
}

/// Polls the reader channel when it exists, otherwise never resolves — lets
/// this branch sit disabled inside `select!` until a connection is live.
async fn recv_from(decoder_rx: &mut Option<mpsc::Receiver<DecodedMessage>>) -> Option<DecodedMessage> {
    match decoder_rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
