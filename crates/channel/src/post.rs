//! Native cross-context post adapters.
//!
//! [`AsyncPostChannel`] maps onto a host primitive that already delivers
//! asynchronously. [`SyncPostChannel`] wraps a synchronous primitive and
//! forces asynchronous semantics by deferring every payload into a local
//! FIFO flushed on [`Channel::tick`], so delivery is never re-entrant with
//! the caller.

use std::collections::VecDeque;

use log::{trace, warn};

use crate::channel::{
    Channel, ChannelWiring, LocalContext, SendOutcome, SetupOutcome, TransportKind,
};
use crate::error::ChannelResult;
use crate::fabric::ContextFabric;

pub struct AsyncPostChannel {
    fabric: ContextFabric,
    local: LocalContext,
    initialized: bool,
}

impl AsyncPostChannel {
    pub fn new(fabric: ContextFabric, local: LocalContext) -> Self {
        Self {
            fabric,
            local,
            initialized: false,
        }
    }
}

impl Channel for AsyncPostChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::AsyncPost
    }

    fn origin_verifiable(&self) -> bool {
        true
    }

    fn init(&mut self, _wiring: ChannelWiring) -> ChannelResult<()> {
        // Inbound delivery rides the receiving context's own fabric
        // registration; nothing else to wire on the sending side.
        self.initialized = true;
        Ok(())
    }

    fn setup(&mut self, receiver_id: &str, _token: &str) -> SetupOutcome {
        if self.fabric.contains(receiver_id) {
            SetupOutcome::Ready
        } else {
            SetupOutcome::TargetMissing
        }
    }

    fn call(&mut self, target: &str, _from: &str, raw: &str) -> SendOutcome {
        if !self.initialized {
            warn!("async-post used before init");
            return SendOutcome::Failed;
        }
        match self.fabric.deliver(target, raw, Some(&self.local.origin)) {
            Ok(()) => SendOutcome::Sent,
            Err(err) => {
                warn!("async-post send to {target} failed: {err}");
                SendOutcome::Failed
            }
        }
    }
}

pub struct SyncPostChannel {
    fabric: ContextFabric,
    local: LocalContext,
    initialized: bool,
    deferred: VecDeque<(String, String)>,
}

impl SyncPostChannel {
    pub fn new(fabric: ContextFabric, local: LocalContext) -> Self {
        Self {
            fabric,
            local,
            initialized: false,
            deferred: VecDeque::new(),
        }
    }

    /// Number of payloads waiting for the next tick.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

impl Channel for SyncPostChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::SyncPost
    }

    fn origin_verifiable(&self) -> bool {
        true
    }

    fn init(&mut self, _wiring: ChannelWiring) -> ChannelResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn setup(&mut self, receiver_id: &str, _token: &str) -> SetupOutcome {
        if self.fabric.contains(receiver_id) {
            SetupOutcome::Ready
        } else {
            SetupOutcome::TargetMissing
        }
    }

    fn call(&mut self, target: &str, _from: &str, raw: &str) -> SendOutcome {
        if !self.initialized {
            warn!("sync-post used before init");
            return SendOutcome::Failed;
        }
        // Accept unconditionally; reachability is re-checked at flush time.
        // A target torn down between call and tick drops silently, the same
        // as the underlying primitive racing a context teardown.
        trace!("sync-post deferring payload for {target}");
        self.deferred.push_back((target.to_string(), raw.to_string()));
        SendOutcome::Sent
    }

    fn tick(&mut self) {
        while let Some((target, raw)) = self.deferred.pop_front() {
            if let Err(err) = self.fabric.deliver(&target, &raw, Some(&self.local.origin)) {
                warn!("sync-post flush to {target} dropped: {err}");
            }
        }
    }
}
