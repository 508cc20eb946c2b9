//! In-process registry of reachable contexts.
//!
//! The fabric is the substrate every adapter moves strings through: each
//! registered context exposes its inbound queue, its origin, an optional
//! relay address, and a poll queue for the last-resort transport. Clones
//! share one registry.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rpc_wire::Provenance;

use crate::channel::InboundMessage;
use crate::error::{ChannelError, ChannelResult};

struct ContextSlot {
    origin: String,
    inbound: Sender<InboundMessage>,
    relay: Option<String>,
    poll_queue: VecDeque<String>,
}

#[derive(Clone, Default)]
pub struct ContextFabric {
    inner: Arc<Mutex<HashMap<String, ContextSlot>>>,
}

impl ContextFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context under its peer id. Re-registration replaces the
    /// previous slot; the old inbound queue is dropped.
    pub fn register_context(
        &self,
        id: impl Into<String>,
        origin: impl Into<String>,
        inbound: Sender<InboundMessage>,
    ) {
        let id = id.into();
        let slot = ContextSlot {
            origin: origin.into(),
            inbound,
            relay: None,
            poll_queue: VecDeque::new(),
        };
        self.inner.lock().insert(id, slot);
    }

    /// Drops a context and everything buffered for it.
    pub fn unregister_context(&self, id: &str) {
        self.inner.lock().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    pub fn origin_of(&self, id: &str) -> Option<String> {
        self.inner.lock().get(id).map(|slot| slot.origin.clone())
    }

    pub fn set_relay(&self, id: &str, relay: impl Into<String>) -> ChannelResult<()> {
        let mut inner = self.inner.lock();
        let slot = inner
            .get_mut(id)
            .ok_or_else(|| ChannelError::UnknownContext(id.to_string()))?;
        slot.relay = Some(relay.into());
        Ok(())
    }

    pub fn relay_of(&self, id: &str) -> Option<String> {
        self.inner.lock().get(id).and_then(|slot| slot.relay.clone())
    }

    /// Pushes a payload onto `target`'s inbound queue.
    ///
    /// `origin` must be the *verified* origin of the sending context, or
    /// `None` when the calling channel cannot verify it.
    pub fn deliver(&self, target: &str, raw: &str, origin: Option<&str>) -> ChannelResult<()> {
        let inner = self.inner.lock();
        let slot = inner
            .get(target)
            .ok_or_else(|| ChannelError::UnknownContext(target.to_string()))?;
        let message = InboundMessage {
            raw: raw.to_string(),
            provenance: origin.map(Provenance::verified).unwrap_or_default(),
        };
        slot.inbound
            .send(message)
            .map_err(|_| ChannelError::UnknownContext(target.to_string()))
    }

    /// Queues a URL-encoded payload for `target` to poll later.
    pub fn push_poll(&self, target: &str, url: String) -> ChannelResult<()> {
        let mut inner = self.inner.lock();
        let slot = inner
            .get_mut(target)
            .ok_or_else(|| ChannelError::UnknownContext(target.to_string()))?;
        slot.poll_queue.push_back(url);
        Ok(())
    }

    /// Drains up to `max` queued poll payloads for `id`, oldest first.
    pub fn drain_poll(&self, id: &str, max: usize) -> Vec<String> {
        if max == 0 {
            return Vec::new();
        }
        let mut inner = self.inner.lock();
        let Some(slot) = inner.get_mut(id) else {
            return Vec::new();
        };
        let take = max.min(slot.poll_queue.len());
        slot.poll_queue.drain(..take).collect()
    }
}
