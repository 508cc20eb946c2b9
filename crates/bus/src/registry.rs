//! Per-peer receiver records and the handshake state machine.
//!
//! State transitions:
//! `Unconfigured -> Attempting` on the first setup call;
//! `Attempting -> Ready` when the channel confirms reachability
//! (synchronously, by ready signal, or by ack envelope);
//! `Attempting -> Attempting` while the bounded retry budget lasts;
//! `Attempting -> Fallback` when it is exhausted;
//! any state -> removed on explicit teardown.

use std::collections::{HashMap, VecDeque};

use rpc_wire::Envelope;

/// Handshake progress for one receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandshakeState {
    /// Known by id only; nothing attempted yet.
    #[default]
    Unconfigured,
    /// Setup in flight; `attempts_left` retries remain.
    Attempting {
        attempts_left: u32,
    },
    /// The channel can reach this peer; calls flow immediately.
    Ready,
    /// Retry budget exhausted; every call is a silent no-op.
    Fallback,
}

/// Everything the bus tracks about one logical peer.
#[derive(Default)]
pub(crate) struct ReceiverRecord {
    pub relay_url: Option<String>,
    pub auth_token: String,
    pub legacy: bool,
    pub state: HandshakeState,
    /// Calls made before the peer was ready; insertion order is send order.
    pub early_queue: VecDeque<Envelope>,
}

#[derive(Default)]
pub(crate) struct Registry {
    records: HashMap<String, ReceiverRecord>,
}

impl Registry {
    /// Returns the record for `peer`, creating it as `Unconfigured` on first
    /// reference.
    pub fn record_mut(&mut self, peer: &str) -> &mut ReceiverRecord {
        self.records.entry(peer.to_string()).or_default()
    }

    pub fn get(&self, peer: &str) -> Option<&ReceiverRecord> {
        self.records.get(peer)
    }

    pub fn state(&self, peer: &str) -> HandshakeState {
        self.records
            .get(peer)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// Token expected on envelopes from `peer`, when one is enforceable.
    ///
    /// Legacy-protocol peers predate token auth, so no token is expected
    /// from them regardless of what the record stores.
    pub fn expected_token(&self, peer: &str) -> Option<String> {
        self.records.get(peer).and_then(|r| {
            if r.legacy || r.auth_token.is_empty() {
                None
            } else {
                Some(r.auth_token.clone())
            }
        })
    }

    pub fn remove(&mut self, peer: &str) -> Option<ReceiverRecord> {
        self.records.remove(peer)
    }
}
