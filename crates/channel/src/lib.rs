#![allow(missing_docs)]
//! Pluggable channels for moving opaque strings between isolated contexts.
//!
//! Every concrete way of crossing the isolation boundary hides behind the
//! [`Channel`] trait; the dispatch core treats all of them identically. The
//! [`ContextFabric`] is the in-process substrate the adapters are thin over:
//! a registry of reachable contexts with their inbound queues, origins,
//! relay addresses, and poll queues.

mod channel;
mod error;
mod fabric;
mod null;
mod polling;
mod post;
mod relay;
mod select;

pub use channel::{
    Channel, ChannelWiring, InboundMessage, LocalContext, SendOutcome, SetupOutcome, TransportKind,
};
pub use error::{ChannelError, ChannelResult};
pub use fabric::ContextFabric;
pub use null::NullChannel;
pub use polling::PollingChannel;
pub use post::{AsyncPostChannel, SyncPostChannel};
pub use relay::RelayChannel;
pub use select::{make_channel, select_channel, HostCapabilities};
