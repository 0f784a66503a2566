//! Per-connection message store — completion slots keyed by message id.
//!
//! Mutated only from the owning connection's bound executor; the
//! `oneshot::Receiver` handed back by `add_request` may be awaited from
//! any task.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use vst_core::envelope::decode_response_envelope;
use vst_core::error::{DriverError, DriverResult};
use vst_core::model::Response;

type Slot = oneshot::Sender<DriverResult<Response>>;

/// In-memory map of pending completions for one connection.
#[derive(Clone)]
pub struct MessageStore {
    slots: Arc<DashMap<u64, Slot>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self { slots: Arc::new(DashMap::new()) }
    }

    /// Allocates a PENDING slot for `id`, returning the receiving half of
    /// its completion.
    pub fn add_request(&self, id: u64) -> oneshot::Receiver<DriverResult<Response>> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        rx
    }

    /// Parses `payload` as a response envelope + body and resolves the
    /// slot for `id`. An unknown id is a protocol violation — logged and
    /// discarded, not propagated, since the server is the one misbehaving
    /// and there's no caller left to tell.
    pub fn resolve(&self, id: u64, payload: &[u8]) {
        let Some((_, tx)) = self.slots.remove(&id) else {
            tracing::warn!(message_id = id, "response for unknown message id, discarding");
            return;
        };

        let result = decode_response_envelope(payload).map(|(envelope, consumed)| Response {
            version: envelope.version,
            code: envelope.code as u16,
            meta: envelope.meta,
            body: bytes::Bytes::copy_from_slice(&payload[consumed..]),
        });

        // The receiver may already be gone (caller cancelled) — that's fine,
        // the response is simply discarded.
        let _ = tx.send(result);
    }

    /// Fails every pending slot with `error` and removes them.
    pub fn clear(&self, error: DriverError) {
        let ids: Vec<u64> = self.slots.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.slots.remove(&id) {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    /// Drops a slot without resolving it — used when a write fails before
    /// any response could possibly arrive, so the entry would otherwise
    /// linger forever.
    pub fn remove(&self, id: u64) {
        self.slots.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
