//! Transport selection from declared host capabilities.

use log::debug;

use crate::channel::{Channel, LocalContext, TransportKind};
use crate::fabric::ContextFabric;
use crate::null::NullChannel;
use crate::polling::PollingChannel;
use crate::post::{AsyncPostChannel, SyncPostChannel};
use crate::relay::RelayChannel;

/// Host capability flags, one per probe-able transport mechanism.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    pub async_post: bool,
    pub sync_post: bool,
    pub relay: bool,
    pub polling: bool,
}

impl HostCapabilities {
    /// A host with every mechanism available.
    pub fn all() -> Self {
        Self {
            async_post: true,
            sync_post: true,
            relay: true,
            polling: true,
        }
    }

    /// Whether the host can use `kind` at all.
    pub fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::AsyncPost => self.async_post,
            TransportKind::SyncPost => self.sync_post,
            TransportKind::Relay => self.relay,
            TransportKind::Polling => self.polling,
            TransportKind::Null => true,
        }
    }
}

/// Probe order. Higher entries are both faster and easier to verify.
const PRIORITY: [TransportKind; 4] = [
    TransportKind::AsyncPost,
    TransportKind::SyncPost,
    TransportKind::Relay,
    TransportKind::Polling,
];

/// Constructs a channel of the given kind.
pub fn make_channel(
    kind: TransportKind,
    fabric: &ContextFabric,
    local: &LocalContext,
) -> Box<dyn Channel> {
    match kind {
        TransportKind::AsyncPost => {
            Box::new(AsyncPostChannel::new(fabric.clone(), local.clone()))
        }
        TransportKind::SyncPost => Box::new(SyncPostChannel::new(fabric.clone(), local.clone())),
        TransportKind::Relay => Box::new(RelayChannel::new(fabric.clone(), local.clone())),
        TransportKind::Polling => Box::new(PollingChannel::new(fabric.clone(), local.clone())),
        TransportKind::Null => Box::new(NullChannel::new()),
    }
}

/// Picks the primary channel for a context.
///
/// An explicit override wins when the host actually supports it; an
/// incapable override falls through to probing. A host with no capable
/// mechanism gets the null channel, turning every send into a logged drop.
pub fn select_channel(
    fabric: &ContextFabric,
    local: &LocalContext,
    caps: &HostCapabilities,
    override_kind: Option<TransportKind>,
) -> Box<dyn Channel> {
    if let Some(kind) = override_kind {
        if kind != TransportKind::Null && caps.supports(kind) {
            debug!("transport override selected {}", kind.as_str());
            return make_channel(kind, fabric, local);
        }
        debug!(
            "transport override {} not supported by host, probing",
            kind.as_str()
        );
    }

    for kind in PRIORITY {
        if caps.supports(kind) {
            debug!("selected transport {}", kind.as_str());
            return make_channel(kind, fabric, local);
        }
    }

    debug!("no capable transport, falling back to null channel");
    make_channel(TransportKind::Null, fabric, local)
}
