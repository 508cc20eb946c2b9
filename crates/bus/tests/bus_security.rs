//! Token verification, origin forgery, violation policy, legacy peers,
//! and referrer disclosure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use rpc_bus::{
    Bus, ContextFabric, HandshakeState, ReferrerPolicy, SecurityAlert, ViolationPolicy, PARENT_ID,
};

const PARENT_ORIGIN: &str = "https://container.example.com";
const CHILD_ORIGIN: &str = "https://apps.example.com";

type AlertLog = Arc<Mutex<Vec<(String, SecurityAlert)>>>;

fn alert_log() -> AlertLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn settle(buses: &[&Bus]) {
    loop {
        let work: usize = buses.iter().map(|bus| bus.pump()).sum();
        if work == 0 {
            break;
        }
    }
}

fn parent_with(fabric: &ContextFabric, alerts: &AlertLog, violation: ViolationPolicy) -> Bus {
    let _ = env_logger::builder().is_test(true).try_init();
    let sink = alerts.clone();
    Bus::builder()
        .context_id(PARENT_ID)
        .origin(PARENT_ORIGIN)
        .fabric(fabric.clone())
        .violation_policy(violation)
        .security_hook(move |peer, alert| sink.lock().push((peer.to_string(), alert)))
        .build()
        .unwrap()
}

fn child(fabric: &ContextFabric) -> Bus {
    Bus::builder()
        .context_id("g1")
        .origin(CHILD_ORIGIN)
        .fabric(fabric.clone())
        .build()
        .unwrap()
}

/// Matching tokens on both sides raise nothing and deliver normally.
#[test]
fn matching_tokens_pass_silently() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::Alert);
    let child = child(&fabric);
    settle(&[&parent, &child]);

    parent.set_auth_token("g1", "shared-secret");
    child.set_auth_token(PARENT_ID, "shared-secret");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    child.call(PARENT_ID, "ping", vec![]);
    settle(&[&parent, &child]);

    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert!(alerts.lock().is_empty(), "no alert on matching tokens");
    assert_eq!(parent.metrics().token_mismatches, 0);
}

/// The direct same-origin path carries the stored token like every other
/// route, so matching configured tokens never alert there either.
#[test]
fn same_origin_calls_carry_the_stored_token() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::AlertAndDrop);
    let child = Bus::builder()
        .context_id("g1")
        .origin(PARENT_ORIGIN)
        .fabric(fabric.clone())
        .build()
        .unwrap();
    settle(&[&parent, &child]);

    parent.set_auth_token("g1", "shared-secret");
    child.set_auth_token(PARENT_ID, "shared-secret");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    child.call(PARENT_ID, "ping", vec![]);
    settle(&[&parent, &child]);

    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert!(alerts.lock().is_empty(), "no alert on matching tokens");
    assert_eq!(parent.metrics().token_mismatches, 0);
}

/// A token configured on the container before the client even exists still
/// lets the startup handshake complete, under either violation policy: the
/// announce and its reply carry the stored token too.
#[test]
fn preconfigured_tokens_survive_the_handshake() {
    for violation in [ViolationPolicy::Alert, ViolationPolicy::AlertAndDrop] {
        let fabric = ContextFabric::new();
        let alerts = alert_log();
        let parent = parent_with(&fabric, &alerts, violation);
        parent.set_auth_token("g1", "shared-secret");

        let child = Bus::builder()
            .context_id("g1")
            .origin(CHILD_ORIGIN)
            .auth_token("shared-secret")
            .fabric(fabric.clone())
            .build()
            .unwrap();
        settle(&[&parent, &child]);

        assert_eq!(parent.handshake_state("g1"), HandshakeState::Ready);
        assert_eq!(child.handshake_state(PARENT_ID), HandshakeState::Ready);
        assert!(alerts.lock().is_empty(), "announce carries the boot token");
        assert_eq!(parent.metrics().token_mismatches, 0);
    }
}

/// Under the permissive default, a token mismatch raises the alert but the
/// envelope is still processed.
#[test]
fn token_mismatch_alerts_and_continues() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::Alert);
    let child = child(&fabric);
    settle(&[&parent, &child]);

    parent.set_auth_token("g1", "expected");
    child.set_auth_token(PARENT_ID, "forged");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    child.call(PARENT_ID, "ping", vec![]);
    settle(&[&parent, &child]);

    assert_eq!(hits.load(Ordering::Relaxed), 1, "permissive policy delivers");
    assert_eq!(
        alerts.lock().as_slice(),
        [("g1".to_string(), SecurityAlert::TokenMismatch)]
    );
    assert_eq!(parent.metrics().token_mismatches, 1);
}

/// Under `AlertAndDrop` the same mismatch suppresses delivery.
#[test]
fn token_mismatch_drops_under_strict_policy() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::AlertAndDrop);
    let child = child(&fabric);
    settle(&[&parent, &child]);

    parent.set_auth_token("g1", "expected");
    child.set_auth_token(PARENT_ID, "forged");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    child.call(PARENT_ID, "ping", vec![]);
    settle(&[&parent, &child]);

    assert_eq!(hits.load(Ordering::Relaxed), 0, "strict policy drops");
    assert_eq!(
        alerts.lock().as_slice(),
        [("g1".to_string(), SecurityAlert::TokenMismatch)]
    );
}

/// A sender whose claimed origin contradicts the channel-verified origin is
/// flagged as a forgery.
#[test]
fn forged_origin_is_detected() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::AlertAndDrop);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    // Sibling-qualified sender claiming apps.example.com, actually verified
    // as a different origin by the delivering channel.
    let raw = format!(
        r#"{{"s":"ping","f":"g1|{CHILD_ORIGIN}","a":[]}}"#
    );
    fabric
        .deliver(PARENT_ID, &raw, Some("https://evil.example.com"))
        .unwrap();
    settle(&[&parent]);

    assert_eq!(hits.load(Ordering::Relaxed), 0);
    assert_eq!(
        alerts.lock().as_slice(),
        [("g1".to_string(), SecurityAlert::ForgedMessage)]
    );
    assert_eq!(parent.metrics().forged, 1);

    // The same claim verified as the matching origin passes.
    fabric.deliver(PARENT_ID, &raw, Some(CHILD_ORIGIN)).unwrap();
    settle(&[&parent]);
    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert_eq!(alerts.lock().len(), 1, "no second alert");
}

/// Peers flagged as legacy speak the positional wire form and are exempt
/// from token enforcement, since that form cannot carry a token.
#[test]
fn legacy_peers_bypass_token_enforcement() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::AlertAndDrop);
    let child = child(&fabric);
    settle(&[&parent, &child]);

    parent.set_auth_token("g1", "expected");
    parent.set_legacy_protocol("g1", true);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    parent
        .register("ping", move |_ctx, _args| {
            counter.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();

    // The child was never given the token; a legacy peer cannot send one.
    child.call(PARENT_ID, "ping", vec![]);
    settle(&[&parent, &child]);

    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert!(alerts.lock().is_empty());

    // Outbound envelopes to the legacy peer use the positional form, which
    // the receiving end accepts transparently.
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    child
        .register("poke", move |_ctx, _args| {
            sink.fetch_add(1, Ordering::Relaxed);
            None
        })
        .unwrap();
    parent.call("g1", "poke", vec![json!(7)]);
    settle(&[&parent, &child]);
    assert_eq!(seen.load(Ordering::Relaxed), 1);
}

/// The referrer policy controls whether and how much of the sender's
/// address is disclosed to the callee.
#[test]
fn referrer_policy_governs_disclosure() {
    let fabric = ContextFabric::new();
    let parent = Bus::builder()
        .context_id(PARENT_ID)
        .origin(PARENT_ORIGIN)
        .fabric(fabric.clone())
        .build()
        .unwrap();
    let child = Bus::builder()
        .context_id("g1")
        .origin(CHILD_ORIGIN)
        .url(format!("{CHILD_ORIGIN}/widget?id=1#state"))
        .fabric(fabric.clone())
        .referrer_policy("c2p:query".parse::<ReferrerPolicy>().unwrap())
        .build()
        .unwrap();
    settle(&[&parent, &child]);

    let referrers: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = referrers.clone();
    parent
        .register("note", move |ctx, _args| {
            sink.lock().push(ctx.referrer.clone());
            None
        })
        .unwrap();

    child.call(PARENT_ID, "note", vec![]);
    settle(&[&parent, &child]);
    assert_eq!(
        referrers.lock().as_slice(),
        [Some(format!("{CHILD_ORIGIN}/widget?id=1"))],
        "query contents stop before the fragment"
    );

    // The default policy discloses nothing.
    let quiet = Bus::builder()
        .context_id("g2")
        .origin(CHILD_ORIGIN)
        .fabric(fabric.clone())
        .build()
        .unwrap();
    settle(&[&parent, &quiet]);
    quiet.call(PARENT_ID, "note", vec![]);
    settle(&[&parent, &quiet]);
    assert_eq!(referrers.lock().last(), Some(&None));
}

/// Malformed payloads never reach handlers and are accounted for.
#[test]
fn malformed_payloads_are_counted_and_dropped() {
    let fabric = ContextFabric::new();
    let alerts = alert_log();
    let parent = parent_with(&fabric, &alerts, ViolationPolicy::Alert);

    fabric.deliver(PARENT_ID, "not json at all", None).unwrap();
    fabric.deliver(PARENT_ID, r#"{"a":[]}"#, None).unwrap();
    settle(&[&parent]);

    assert_eq!(parent.metrics().malformed, 2);
    assert!(alerts.lock().is_empty(), "malformed input is not a violation");
}
