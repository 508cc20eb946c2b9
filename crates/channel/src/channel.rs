//! Channel trait and the types shared by every adapter.

use crossbeam_channel::Sender;

use rpc_wire::Provenance;

use crate::error::ChannelResult;

/// A raw payload handed up to the dispatch core, plus what the channel
/// could verify about its sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Opaque wire string as received.
    pub raw: String,
    /// What the delivering channel verified about the sender.
    pub provenance: Provenance,
}

/// Hooks the dispatcher wires into a channel at init time.
#[derive(Clone)]
pub struct ChannelWiring {
    /// Queue for inbound envelopes.
    pub inbound: Sender<InboundMessage>,
    /// Out-of-band "peer ready" signal, carrying the peer id.
    pub ready: Sender<String>,
}

/// Identity of the context this channel end lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalContext {
    /// Stable peer id of this context (`".."` for the container).
    pub id: String,
    /// This context's own origin.
    pub origin: String,
    /// Full address of this context; origin plus path/query/fragment.
    pub url: String,
}

impl LocalContext {
    pub fn new(
        id: impl Into<String>,
        origin: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            url: url.into(),
        }
    }
}

/// Concrete transport mechanisms, in strict selection priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Native asynchronous cross-context post.
    AsyncPost,
    /// Native synchronous post, wrapped to force asynchronous delivery.
    SyncPost,
    /// Signaling through a same-origin relay resource.
    Relay,
    /// Last-resort polling of URL-encoded payloads.
    Polling,
    /// The no-op fallback; never probed, only assigned.
    Null,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::AsyncPost => "async-post",
            TransportKind::SyncPost => "sync-post",
            TransportKind::Relay => "relay",
            TransportKind::Polling => "polling",
            TransportKind::Null => "null",
        }
    }
}

/// Result of a per-receiver setup attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The channel can reach the receiver right now.
    Ready,
    /// Setup started; confirmation arrives out-of-band (ready signal or ack).
    Pending,
    /// The receiver does not exist in the addressable namespace yet.
    TargetMissing,
}

/// Result of handing one payload to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The channel accepted the payload (delivery may still be deferred).
    Sent,
    /// The channel could not send; the caller should fall back.
    Failed,
}

/// One concrete way to move an opaque string between two isolated contexts.
///
/// Implementations must be cheap to call and must never block: deferred
/// mechanisms buffer in [`Channel::call`] and flush in [`Channel::tick`].
pub trait Channel: Send {
    /// Which transport mechanism this is.
    fn kind(&self) -> TransportKind;

    /// Whether this channel can verify the sending context's origin.
    fn origin_verifiable(&self) -> bool {
        false
    }

    /// Wires the dispatcher's inbound queue and ready signal into the
    /// channel. Called exactly once before any other operation.
    fn init(&mut self, wiring: ChannelWiring) -> ChannelResult<()>;

    /// Attempts the per-receiver handshake.
    fn setup(&mut self, receiver_id: &str, token: &str) -> SetupOutcome;

    /// Moves one payload toward `target`.
    fn call(&mut self, target: &str, from: &str, raw: &str) -> SendOutcome;

    /// Gives deferred/polling channels a chance to move buffered payloads.
    fn tick(&mut self) {}
}
