//! Outstanding-call bookkeeping.
//!
//! One entry per call issued with a callback, keyed by call id and resolved
//! exactly once by the callback pseudo-service. Entries are dropped without
//! firing when their target peer is torn down.

use std::collections::HashMap;

use rpc_wire::Value;

pub(crate) struct PendingEntry {
    /// Peer the call was addressed to; used for teardown garbage collection.
    pub target: String,
    pub complete: Box<dyn FnOnce(Value) + Send>,
}

#[derive(Default)]
pub(crate) struct PendingCallbacks {
    entries: HashMap<u64, PendingEntry>,
}

impl PendingCallbacks {
    pub fn insert(&mut self, call_id: u64, entry: PendingEntry) {
        self.entries.insert(call_id, entry);
    }

    /// Removes the entry for `call_id`; a second take for the same id
    /// returns `None`, which is what makes replies at-most-once.
    pub fn take(&mut self, call_id: u64) -> Option<PendingEntry> {
        self.entries.remove(&call_id)
    }

    /// Drops every entry addressed to `target`. Returns how many were
    /// discarded.
    pub fn drop_for_target(&mut self, target: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.target != target);
        before - self.entries.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
