//! The no-op fallback channel.
//!
//! Substituted for any peer whose real channel setup or send fails. Every
//! send is reported as accepted and silently dropped, so a dead peer never
//! raises from the caller's side; the drop is logged here and accounted for
//! by the dispatcher's metrics.

use log::debug;

use crate::channel::{Channel, ChannelWiring, SendOutcome, SetupOutcome, TransportKind};
use crate::error::ChannelResult;

#[derive(Default)]
pub struct NullChannel;

impl NullChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Channel for NullChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Null
    }

    fn init(&mut self, _wiring: ChannelWiring) -> ChannelResult<()> {
        Ok(())
    }

    fn setup(&mut self, _receiver_id: &str, _token: &str) -> SetupOutcome {
        SetupOutcome::Ready
    }

    fn call(&mut self, target: &str, _from: &str, _raw: &str) -> SendOutcome {
        debug!("null channel dropping payload for {target}");
        SendOutcome::Sent
    }
}
