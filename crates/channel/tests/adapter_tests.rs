//! Adapter behaviour tests over a shared in-process fabric.

use crossbeam_channel::unbounded;
use rpc_channel::{
    AsyncPostChannel, Channel, ChannelWiring, ContextFabric, LocalContext, NullChannel,
    PollingChannel, RelayChannel, SendOutcome, SetupOutcome, SyncPostChannel, TransportKind,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wiring() -> (
    ChannelWiring,
    crossbeam_channel::Receiver<rpc_channel::InboundMessage>,
    crossbeam_channel::Receiver<String>,
) {
    let (inbound_tx, inbound_rx) = unbounded();
    let (ready_tx, ready_rx) = unbounded();
    (
        ChannelWiring {
            inbound: inbound_tx,
            ready: ready_tx,
        },
        inbound_rx,
        ready_rx,
    )
}

fn container() -> LocalContext {
    LocalContext::new(
        "..",
        "https://container.example.com",
        "https://container.example.com/page",
    )
}

#[test]
fn async_post_attaches_verified_origin() {
    init_logs();
    let fabric = ContextFabric::new();
    let (client_tx, client_rx) = unbounded();
    fabric.register_context("g1", "https://apps.example.com", client_tx);

    let mut chan = AsyncPostChannel::new(fabric, container());
    let (w, _inbound, _ready) = wiring();
    chan.init(w).unwrap();

    assert_eq!(chan.setup("g1", "tok"), SetupOutcome::Ready);
    assert_eq!(chan.setup("ghost", "tok"), SetupOutcome::TargetMissing);

    assert_eq!(chan.call("g1", "..", "payload"), SendOutcome::Sent);
    let msg = client_rx.try_recv().unwrap();
    assert_eq!(msg.raw, "payload");
    assert_eq!(
        msg.provenance.origin.as_deref(),
        Some("https://container.example.com")
    );

    assert_eq!(chan.call("ghost", "..", "payload"), SendOutcome::Failed);
}

#[test]
fn sync_post_defers_until_tick() {
    init_logs();
    let fabric = ContextFabric::new();
    let (client_tx, client_rx) = unbounded();
    fabric.register_context("g1", "https://apps.example.com", client_tx);

    let mut chan = SyncPostChannel::new(fabric, container());
    let (w, _inbound, _ready) = wiring();
    chan.init(w).unwrap();

    assert_eq!(chan.call("g1", "..", "one"), SendOutcome::Sent);
    assert_eq!(chan.call("g1", "..", "two"), SendOutcome::Sent);
    assert_eq!(chan.deferred_len(), 2);
    assert!(client_rx.try_recv().is_err());

    chan.tick();
    assert_eq!(chan.deferred_len(), 0);
    assert_eq!(client_rx.try_recv().unwrap().raw, "one");
    assert_eq!(client_rx.try_recv().unwrap().raw, "two");
}

#[test]
fn relay_confirms_out_of_band_and_needs_a_relay() {
    init_logs();
    let fabric = ContextFabric::new();
    let (client_tx, client_rx) = unbounded();
    fabric.register_context("g1", "https://apps.example.com", client_tx);

    let mut chan = RelayChannel::new(fabric.clone(), container());
    let (w, _inbound, ready_rx) = wiring();
    chan.init(w).unwrap();

    // No relay registered yet: the peer is not addressable.
    assert_eq!(chan.setup("g1", "tok"), SetupOutcome::TargetMissing);
    assert_eq!(chan.call("g1", "..", "payload"), SendOutcome::Failed);

    fabric
        .set_relay("g1", "https://container.example.com/relay.html")
        .unwrap();
    assert_eq!(chan.setup("g1", "tok"), SetupOutcome::Pending);
    assert_eq!(ready_rx.try_recv().unwrap(), "g1");

    assert_eq!(chan.call("g1", "..", "payload"), SendOutcome::Sent);
    let msg = client_rx.try_recv().unwrap();
    assert_eq!(msg.raw, "payload");
    // Relay writes are anonymous at the transport level.
    assert_eq!(msg.provenance.origin, None);
}

#[test]
fn polling_round_trips_through_urls() {
    init_logs();
    let fabric = ContextFabric::new();

    // Container side: sender.
    let (container_tx, _container_rx) = unbounded();
    fabric.register_context("..", "https://container.example.com", container_tx);
    let mut sender = PollingChannel::new(fabric.clone(), container());

    // Embedded side: receiver with its own channel end.
    let (client_tx, _client_fabric_rx) = unbounded();
    fabric.register_context("g1", "https://apps.example.com", client_tx);
    let client_local = LocalContext::new(
        "g1",
        "https://apps.example.com",
        "https://apps.example.com/widget",
    );
    let mut receiver = PollingChannel::new(fabric.clone(), client_local);
    let (w, inbound_rx, _ready) = wiring();
    receiver.init(w).unwrap();
    let (w2, _inbound2, _ready2) = wiring();
    sender.init(w2).unwrap();

    let raw = r#"{"s":"echo","f":"..","a":["hi #1, 50%"]}"#;
    assert_eq!(sender.call("g1", "..", raw), SendOutcome::Sent);

    // Nothing moves until the receiving side polls.
    assert!(inbound_rx.try_recv().is_err());
    receiver.tick();
    let msg = inbound_rx.try_recv().unwrap();
    assert_eq!(msg.raw, raw);
    assert_eq!(msg.provenance.origin, None);
}

#[test]
fn null_channel_swallows_everything() {
    init_logs();
    let mut chan = NullChannel::new();
    let (w, inbound_rx, _ready) = wiring();
    chan.init(w).unwrap();

    assert_eq!(chan.kind(), TransportKind::Null);
    assert_eq!(chan.setup("anyone", "tok"), SetupOutcome::Ready);
    assert_eq!(chan.call("anyone", "..", "payload"), SendOutcome::Sent);
    assert!(inbound_rx.try_recv().is_err());
}
