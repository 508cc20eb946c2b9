//! Relay-resource signaling adapter.
//!
//! Payloads cross the boundary through a same-origin relay resource the
//! target context must have registered. The relay attach is confirmed
//! out-of-band via the wiring's ready signal; the relay cannot prove who
//! wrote into it, so inbound payloads arrive with no verified origin.

use log::{debug, warn};

use crate::channel::{
    Channel, ChannelWiring, LocalContext, SendOutcome, SetupOutcome, TransportKind,
};
use crate::error::ChannelResult;
use crate::fabric::ContextFabric;

pub struct RelayChannel {
    fabric: ContextFabric,
    local: LocalContext,
    wiring: Option<ChannelWiring>,
}

impl RelayChannel {
    pub fn new(fabric: ContextFabric, local: LocalContext) -> Self {
        Self {
            fabric,
            local,
            wiring: None,
        }
    }
}

impl Channel for RelayChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Relay
    }

    fn init(&mut self, wiring: ChannelWiring) -> ChannelResult<()> {
        self.wiring = Some(wiring);
        Ok(())
    }

    fn setup(&mut self, receiver_id: &str, _token: &str) -> SetupOutcome {
        if !self.fabric.contains(receiver_id) {
            return SetupOutcome::TargetMissing;
        }
        let Some(relay) = self.fabric.relay_of(receiver_id) else {
            // Context exists but its relay resource has not loaded yet.
            return SetupOutcome::TargetMissing;
        };
        debug!(
            "relay attach for {receiver_id} via {relay} (local {})",
            self.local.id
        );
        if let Some(wiring) = &self.wiring {
            // The attach confirms asynchronously; surface it on the ready
            // queue so the dispatcher observes it on its next pump.
            let _ = wiring.ready.send(receiver_id.to_string());
        }
        SetupOutcome::Pending
    }

    fn call(&mut self, target: &str, _from: &str, raw: &str) -> SendOutcome {
        if self.fabric.relay_of(target).is_none() {
            warn!("relay send to {target} failed: no relay registered");
            return SendOutcome::Failed;
        }
        match self.fabric.deliver(target, raw, None) {
            Ok(()) => SendOutcome::Sent,
            Err(err) => {
                warn!("relay send to {target} failed: {err}");
                SendOutcome::Failed
            }
        }
    }
}
