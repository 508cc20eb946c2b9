//! Secure, transport-agnostic remote-call bus between isolated contexts.
//!
//! A [`Bus`] lives in one execution context (the container, or an embedded
//! client) and reaches its peers exclusively through pluggable
//! [`Channel`]s. The core gives every caller one uniform surface:
//! * calls to peers that are not ready yet queue in FIFO order and flush
//!   once the per-peer handshake completes;
//! * replies correlate back to their calls through a pending-callback table;
//! * a failed send demotes the peer to the no-op fallback channel after
//!   exactly one extra hop;
//! * token and identity violations are reported through an advisory
//!   security hook without ever raising into application code.
//!
//! All inbound processing and every handshake retry runs inside
//! [`Bus::pump`], which the host invokes from its single logical event
//! loop.

mod error;
mod metrics;
mod pending;
mod process;
mod referrer;
mod registry;
mod sched;
mod security;
mod services;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver};
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::json;

use rpc_channel::{make_channel, select_channel};
use rpc_wire::encode;

pub use error::{BusError, BusResult};
pub use metrics::BusMetricsSnapshot;
pub use referrer::{ReferrerContents, ReferrerDirection, ReferrerPolicy};
pub use registry::HandshakeState;
pub use sched::{Clock, ManualClock, SystemClock};
pub use security::{SecurityAlert, SecurityHook, ViolationPolicy};
pub use services::{CallContext, Handler, Responder};

// Re-exported so hosts assemble a bus from this one crate.
pub use rpc_channel::{
    Channel, ChannelResult, ChannelWiring, ContextFabric, HostCapabilities, InboundMessage,
    LocalContext, SendOutcome, SetupOutcome, TransportKind,
};
pub use rpc_wire::{Envelope, Value, ACK_SERVICE, CALLBACK_SERVICE, DEFAULT_SERVICE, PARENT_ID};

use metrics::BusMetrics;
use pending::{PendingCallbacks, PendingEntry};
use registry::Registry;
use sched::{SystemClock as DefaultClock, TimerQueue};
use security::SecurityPolicy;
use services::ServiceTable;

/// Inbound envelopes processed per pump. The queue persists across pumps,
/// so the budget only bounds one pump's work, never drops anything.
const INBOUND_BUDGET: usize = 256;

/// Default fixed interval between handshake retries.
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Default handshake retry budget after the initial attempt.
const DEFAULT_RETRY_BUDGET: u32 = 20;

struct Transport {
    primary: Box<dyn Channel>,
    fallback: Box<dyn Channel>,
}

pub(crate) struct BusInner {
    local: LocalContext,
    fabric: ContextFabric,
    caps: HostCapabilities,
    wiring: ChannelWiring,
    services: Mutex<ServiceTable>,
    registry: Mutex<Registry>,
    pending: Mutex<PendingCallbacks>,
    transport: Mutex<Transport>,
    timers: Mutex<TimerQueue>,
    clock: Arc<dyn Clock>,
    security: SecurityPolicy,
    referrer: ReferrerPolicy,
    metrics: BusMetrics,
    next_call_id: AtomicU64,
    inbound_rx: Receiver<InboundMessage>,
    ready_rx: Receiver<String>,
    retry_interval: Duration,
    retry_budget: u32,
}

/// One end of the remote-call bus. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Starts assembling a bus.
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// This context's own peer id.
    pub fn local_id(&self) -> &str {
        &self.inner.local.id
    }

    /// Whether this bus is the container end.
    pub fn is_container(&self) -> bool {
        self.inner.local.id == PARENT_ID
    }

    /// Kind of the currently active primary channel.
    pub fn transport_kind(&self) -> TransportKind {
        self.inner.transport.lock().primary.kind()
    }

    /// Current counters.
    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Handshake state for `peer` (`Unconfigured` when never referenced).
    pub fn handshake_state(&self, peer: &str) -> HandshakeState {
        self.inner.registry.lock().state(peer)
    }

    // ------------------------------------------------------------------
    // Service table
    // ------------------------------------------------------------------

    /// Registers a service handler. Reserved names are rejected.
    pub fn register(
        &self,
        name: &str,
        handler: impl Fn(&mut CallContext, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> BusResult<()> {
        self.inner.services.lock().register(name, Arc::new(handler))
    }

    /// Removes a service handler. Unregistering a reserved name is rejected;
    /// unregistering an absent name is a no-op.
    pub fn unregister(&self, name: &str) -> BusResult<()> {
        self.inner.services.lock().unregister(name)
    }

    /// Installs the handler invoked for unknown service names.
    pub fn register_default(
        &self,
        handler: impl Fn(&mut CallContext, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) {
        self.inner.services.lock().register_default(Arc::new(handler));
    }

    /// Restores the built-in log-and-drop behaviour for unknown names.
    pub fn unregister_default(&self) {
        self.inner.services.lock().unregister_default();
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Fire-and-forget call. An empty `target` addresses the container.
    pub fn call(&self, target: &str, service: &str, args: Vec<Value>) {
        let target = resolve_target(target);
        let envelope = self.make_envelope(&target, service, 0, args);
        self.dispatch(&target, envelope);
    }

    /// Call expecting a reply; `callback` fires at most once with the
    /// single reply value. A peer that never replies never completes it.
    pub fn call_with(
        &self,
        target: &str,
        service: &str,
        args: Vec<Value>,
        callback: impl FnOnce(Value) + Send + 'static,
    ) {
        let target = resolve_target(target);
        let call_id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        self.inner.pending.lock().insert(
            call_id,
            PendingEntry {
                target: target.clone(),
                complete: Box::new(callback),
            },
        );
        let envelope = self.make_envelope(&target, service, call_id, args);
        self.dispatch(&target, envelope);
    }

    /// Convenience for addressing the container.
    pub fn call_parent(&self, service: &str, args: Vec<Value>) {
        self.call(PARENT_ID, service, args);
    }

    // ------------------------------------------------------------------
    // Receiver management
    // ------------------------------------------------------------------

    /// Establishes (or re-establishes) the receiver record for `target`
    /// and starts its handshake. Idempotent: a record that is already
    /// ready or mid-handshake only absorbs the new relay/token values.
    pub fn setup_receiver(
        &self,
        target: &str,
        relay: Option<&str>,
        token: Option<&str>,
    ) -> BusResult<()> {
        let target = resolve_target(target);
        if target == self.inner.local.id {
            return Err(BusError::InvalidPeerId(target));
        }
        let attempt = {
            let mut registry = self.inner.registry.lock();
            let record = registry.record_mut(&target);
            if let Some(relay) = relay {
                record.relay_url = Some(relay.to_string());
            }
            if let Some(token) = token {
                record.auth_token = token.to_string();
            }
            match record.state {
                HandshakeState::Ready | HandshakeState::Attempting { .. } => false,
                HandshakeState::Unconfigured | HandshakeState::Fallback => {
                    record.state = HandshakeState::Attempting {
                        attempts_left: self.inner.retry_budget,
                    };
                    true
                }
            }
        };
        if attempt {
            self.attempt_setup(&target);
        }
        Ok(())
    }

    /// Relay address stored for `peer`.
    pub fn get_relay_url(&self, peer: &str) -> Option<String> {
        self.inner
            .registry
            .lock()
            .get(peer)
            .and_then(|r| r.relay_url.clone())
    }

    /// Sets the relay address outside the handshake helper.
    pub fn set_relay_url(&self, peer: &str, url: &str) {
        self.inner.registry.lock().record_mut(peer).relay_url = Some(url.to_string());
    }

    /// Auth token stored for `peer`.
    pub fn get_auth_token(&self, peer: &str) -> Option<String> {
        self.inner
            .registry
            .lock()
            .get(peer)
            .map(|r| r.auth_token.clone())
    }

    /// Sets the auth token outside the handshake helper.
    pub fn set_auth_token(&self, peer: &str, token: &str) {
        self.inner.registry.lock().record_mut(peer).auth_token = token.to_string();
    }

    /// Flags `peer` as speaking the older wire sub-format.
    pub fn set_legacy_protocol(&self, peer: &str, legacy: bool) {
        self.inner.registry.lock().record_mut(peer).legacy = legacy;
    }

    /// Drops all bookkeeping for `peer`: its record, queued calls, pending
    /// retries, and outstanding callbacks. The peer is not notified.
    pub fn remove_receiver(&self, peer: &str) {
        self.inner.timers.lock().cancel(peer);
        if let Some(record) = self.inner.registry.lock().remove(peer) {
            for _ in &record.early_queue {
                self.inner.metrics.record_dropped();
            }
        }
        let collected = self.inner.pending.lock().drop_for_target(peer);
        debug!("removed receiver {peer} ({collected} pending callbacks collected)");
    }

    /// Switches the primary channel to one that can verify the parent's
    /// origin, when the current one cannot.
    pub fn force_parent_verifiable(&self) -> BusResult<()> {
        let mut transport = self.inner.transport.lock();
        if transport.primary.origin_verifiable() {
            return Ok(());
        }
        let kind = if self.inner.caps.async_post {
            TransportKind::AsyncPost
        } else if self.inner.caps.sync_post {
            TransportKind::SyncPost
        } else {
            return Err(BusError::NoVerifiableTransport);
        };
        let mut primary = make_channel(kind, &self.inner.fabric, &self.inner.local);
        primary.init(self.inner.wiring.clone())?;
        debug!("switched primary channel to {}", kind.as_str());
        transport.primary = primary;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Runs one scheduler turn: due handshake retries, the channel tick,
    /// ready signals, then inbound envelopes. Returns how much work was
    /// done, so hosts can pump until idle.
    pub fn pump(&self) -> usize {
        let mut work = 0;

        let now = self.inner.clock.now();
        let due = self.inner.timers.lock().pop_due(now);
        for peer in due {
            work += 1;
            self.retry_handshake(&peer);
        }

        self.inner.transport.lock().primary.tick();

        while let Ok(peer) = self.inner.ready_rx.try_recv() {
            work += 1;
            self.mark_ready(&peer);
        }

        let mut inbound = 0;
        while inbound < INBOUND_BUDGET {
            match self.inner.inbound_rx.try_recv() {
                Ok(message) => {
                    inbound += 1;
                    self.process_inbound(message);
                }
                Err(_) => break,
            }
        }
        work + inbound
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn make_envelope(
        &self,
        target: &str,
        service: &str,
        call_id: u64,
        args: Vec<Value>,
    ) -> Envelope {
        let target_is_parent = target == PARENT_ID;
        let mut envelope = Envelope::new(service, self.resolve_from(target), args);
        envelope.call_id = call_id;
        envelope.referrer = self.inner.referrer.referrer_for(
            &self.inner.local,
            self.is_container(),
            target_is_parent,
        );
        envelope
    }

    /// Copies the token and legacy flag stored for `target` into the
    /// envelope. A peer without a record keeps the envelope untouched.
    pub(crate) fn stamp_credentials(&self, target: &str, envelope: &mut Envelope) {
        if let Some(record) = self.inner.registry.lock().get(target) {
            envelope.auth_token = record.auth_token.clone();
            envelope.legacy = record.legacy;
        }
    }

    /// Sender identity: own id toward the parent or from the container,
    /// origin-qualified when addressing a non-parent peer directly.
    fn resolve_from(&self, target: &str) -> String {
        if self.is_container() || target == PARENT_ID {
            self.inner.local.id.clone()
        } else {
            rpc_wire::qualify_sender(&self.inner.local.id, &self.inner.local.origin)
        }
    }

    fn dispatch(&self, target: &str, mut envelope: Envelope) {
        // The peer's stored credentials ride on every envelope, whichever
        // route carries it; queued envelopes are restamped at flush time in
        // case the token arrives while they wait.
        self.stamp_credentials(target, &mut envelope);

        // Same-origin contexts already trust each other's memory; hand the
        // envelope straight to the peer's receiving end.
        if self.inner.fabric.origin_of(target).as_deref() == Some(self.inner.local.origin.as_str())
        {
            self.deliver_direct(target, &envelope);
            return;
        }

        let route = {
            let mut registry = self.inner.registry.lock();
            let record = registry.record_mut(target);
            match record.state {
                HandshakeState::Ready => Some(Route::Primary(envelope)),
                HandshakeState::Fallback => Some(Route::Fallback(envelope)),
                HandshakeState::Unconfigured | HandshakeState::Attempting { .. } => {
                    record.early_queue.push_back(envelope);
                    self.inner.metrics.record_queued();
                    None
                }
            }
        };
        match route {
            Some(Route::Primary(envelope)) => self.send_via_primary(target, envelope),
            Some(Route::Fallback(envelope)) => self.send_via_fallback(target, envelope),
            None => {}
        }
    }

    fn deliver_direct(&self, target: &str, envelope: &Envelope) {
        match encode(envelope) {
            Ok(raw) => {
                if self
                    .inner
                    .fabric
                    .deliver(target, &raw, Some(&self.inner.local.origin))
                    .is_ok()
                {
                    self.inner.metrics.record_sent();
                } else {
                    self.inner.metrics.record_dropped();
                }
            }
            Err(err) => {
                warn!("dropping unencodable envelope for {target}: {err}");
                self.inner.metrics.record_dropped();
            }
        }
    }

    fn send_via_primary(&self, target: &str, envelope: Envelope) {
        let raw = match encode(&envelope) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("dropping unencodable envelope for {target}: {err}");
                self.inner.metrics.record_dropped();
                return;
            }
        };
        let outcome = self
            .inner
            .transport
            .lock()
            .primary
            .call(target, &envelope.from, &raw);
        match outcome {
            SendOutcome::Sent => self.inner.metrics.record_sent(),
            SendOutcome::Failed => {
                // One extra hop, never more: the record is demoted before
                // the retry, so nothing loops back to the primary channel.
                warn!("send to {target} failed; demoting to fallback channel");
                self.inner.registry.lock().record_mut(target).state = HandshakeState::Fallback;
                self.inner.timers.lock().cancel(target);
                self.send_raw_via_fallback(target, &envelope.from, &raw);
            }
        }
    }

    fn send_via_fallback(&self, target: &str, envelope: Envelope) {
        match encode(&envelope) {
            Ok(raw) => self.send_raw_via_fallback(target, &envelope.from, &raw),
            Err(err) => {
                warn!("dropping unencodable envelope for {target}: {err}");
                self.inner.metrics.record_dropped();
            }
        }
    }

    fn send_raw_via_fallback(&self, target: &str, from: &str, raw: &str) {
        let _ = self.inner.transport.lock().fallback.call(target, from, raw);
        self.inner.metrics.record_dropped();
    }

    /// Transitions `peer` to `Ready` and flushes its early queue in FIFO
    /// order, stamping the now-known token into each queued envelope.
    pub(crate) fn mark_ready(&self, peer: &str) {
        let drained: Vec<Envelope> = {
            let mut registry = self.inner.registry.lock();
            let record = registry.record_mut(peer);
            if record.state == HandshakeState::Fallback {
                debug!("ignoring ready signal for demoted peer {peer}");
                return;
            }
            if record.state == HandshakeState::Ready && record.early_queue.is_empty() {
                return;
            }
            record.state = HandshakeState::Ready;
            let token = record.auth_token.clone();
            let legacy = record.legacy;
            record
                .early_queue
                .drain(..)
                .map(|mut envelope| {
                    envelope.auth_token = token.clone();
                    envelope.legacy = legacy;
                    envelope
                })
                .collect()
        };
        self.inner.timers.lock().cancel(peer);
        if !drained.is_empty() {
            debug!("receiver {peer} ready; flushing {} queued calls", drained.len());
        }
        for envelope in drained {
            // A failure mid-flush demotes the record; the rest of the queue
            // must follow it to the fallback channel.
            let state = self.inner.registry.lock().state(peer);
            match state {
                HandshakeState::Ready => self.send_via_primary(peer, envelope),
                _ => self.send_via_fallback(peer, envelope),
            }
        }
    }

    fn attempt_setup(&self, peer: &str) {
        let (token, relay) = {
            let mut registry = self.inner.registry.lock();
            let record = registry.record_mut(peer);
            (record.auth_token.clone(), record.relay_url.clone())
        };
        if let Some(relay) = relay {
            // The peer's context may have appeared since the last attempt.
            let _ = self.inner.fabric.set_relay(peer, relay);
        }
        let outcome = self.inner.transport.lock().primary.setup(peer, &token);
        match outcome {
            SetupOutcome::Ready => self.mark_ready(peer),
            SetupOutcome::Pending | SetupOutcome::TargetMissing => {
                let due = self.inner.clock.now() + self.inner.retry_interval;
                self.inner.timers.lock().schedule(peer, due);
            }
        }
    }

    fn retry_handshake(&self, peer: &str) {
        enum Decision {
            Retry,
            Exhausted { discarded: usize },
        }
        let decision = {
            let mut registry = self.inner.registry.lock();
            let record = registry.record_mut(peer);
            match record.state {
                HandshakeState::Attempting { attempts_left: 0 } => {
                    record.state = HandshakeState::Fallback;
                    let discarded = record.early_queue.len();
                    record.early_queue.clear();
                    Some(Decision::Exhausted { discarded })
                }
                HandshakeState::Attempting { attempts_left } => {
                    record.state = HandshakeState::Attempting {
                        attempts_left: attempts_left - 1,
                    };
                    Some(Decision::Retry)
                }
                // Became ready or was torn down; the timer is stale.
                _ => None,
            }
        };
        match decision {
            Some(Decision::Retry) => self.attempt_setup(peer),
            Some(Decision::Exhausted { discarded }) => {
                for _ in 0..discarded {
                    self.inner.metrics.record_dropped();
                }
                self.inner.metrics.record_handshake_timeout();
                self.inner
                    .security
                    .raise(peer, SecurityAlert::HandshakeTimeout);
            }
            None => {}
        }
    }

    /// Sends a reply envelope through the callback pseudo-service.
    pub(crate) fn send_reply(&self, target: &str, call_id: u64, value: Value) {
        let envelope = self.make_envelope(target, CALLBACK_SERVICE, 0, vec![json!(call_id), value]);
        self.dispatch(target, envelope);
    }

    /// Announces this client to the container so both ends mark each other
    /// ready without an explicit setup call on the client side.
    fn announce_to_parent(&self) {
        let mut envelope =
            Envelope::new(ACK_SERVICE, self.inner.local.id.clone(), vec![json!("syn")]);
        // A container that pre-configured this client's token verifies the
        // announce like any other envelope, so it must carry the token too.
        self.stamp_credentials(PARENT_ID, &mut envelope);
        match encode(&envelope) {
            Ok(raw) => {
                let _ = self
                    .inner
                    .transport
                    .lock()
                    .primary
                    .call(PARENT_ID, &envelope.from, &raw);
            }
            Err(err) => warn!("failed to encode parent announce: {err}"),
        }
    }
}

enum Route {
    Primary(Envelope),
    Fallback(Envelope),
}

fn resolve_target(target: &str) -> String {
    if target.is_empty() {
        PARENT_ID.to_string()
    } else {
        target.to_string()
    }
}

/// Builder for assembling a [`Bus`].
pub struct BusBuilder {
    context_id: Option<String>,
    origin: Option<String>,
    url: Option<String>,
    fabric: Option<ContextFabric>,
    auth_token: Option<String>,
    caps: HostCapabilities,
    transport_override: Option<TransportKind>,
    channel: Option<Box<dyn Channel>>,
    referrer: ReferrerPolicy,
    violation: ViolationPolicy,
    hook: Option<SecurityHook>,
    clock: Option<Arc<dyn Clock>>,
    retry_interval: Duration,
    retry_budget: u32,
    announce: bool,
}

impl BusBuilder {
    pub fn new() -> Self {
        Self {
            context_id: None,
            origin: None,
            url: None,
            fabric: None,
            auth_token: None,
            caps: HostCapabilities::all(),
            transport_override: None,
            channel: None,
            referrer: ReferrerPolicy::default(),
            violation: ViolationPolicy::default(),
            hook: None,
            clock: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retry_budget: DEFAULT_RETRY_BUDGET,
            announce: true,
        }
    }

    /// Stable peer id of this context; use [`PARENT_ID`] for the
    /// container.
    pub fn context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Full address of this context. Defaults to the origin.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn fabric(mut self, fabric: ContextFabric) -> Self {
        self.fabric = Some(fabric);
        self
    }

    /// Token this context presents to the container, handed to it out of
    /// band at boot (typically in its address). Stored before the startup
    /// announce so the very first envelope already carries it.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn capabilities(mut self, caps: HostCapabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Forces a transport kind, when the host supports it.
    pub fn transport_override(mut self, kind: TransportKind) -> Self {
        self.transport_override = Some(kind);
        self
    }

    /// Injects a pre-built primary channel, bypassing selection entirely.
    pub fn channel(mut self, channel: Box<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn referrer_policy(mut self, policy: ReferrerPolicy) -> Self {
        self.referrer = policy;
        self
    }

    pub fn violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation = policy;
        self
    }

    /// Installs the advisory security policy hook.
    pub fn security_hook(
        mut self,
        hook: impl Fn(&str, SecurityAlert) + Send + Sync + 'static,
    ) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Injects a clock; tests use [`ManualClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Tunes the handshake retry loop.
    pub fn handshake_retry(mut self, interval: Duration, budget: u32) -> Self {
        self.retry_interval = interval;
        self.retry_budget = budget;
        self
    }

    /// Suppresses the startup announce toward the container.
    pub fn announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// Builds the bus, registers its context on the fabric, and brings the
    /// primary channel up. A failed channel init demotes straight to the
    /// null channel rather than failing the build.
    pub fn build(self) -> anyhow::Result<Bus> {
        let context_id = self.context_id.ok_or_else(|| anyhow!("missing context id"))?;
        let origin = self.origin.ok_or_else(|| anyhow!("missing origin"))?;
        let fabric = self.fabric.ok_or_else(|| anyhow!("missing context fabric"))?;
        let url = self.url.unwrap_or_else(|| origin.clone());
        let local = LocalContext::new(context_id, origin, url);

        let (inbound_tx, inbound_rx) = unbounded();
        let (ready_tx, ready_rx) = unbounded();
        fabric.register_context(&local.id, &local.origin, inbound_tx.clone());
        let wiring = ChannelWiring {
            inbound: inbound_tx,
            ready: ready_tx,
        };

        let mut primary = match self.channel {
            Some(channel) => channel,
            None => select_channel(&fabric, &local, &self.caps, self.transport_override),
        };
        if let Err(err) = primary.init(wiring.clone()) {
            warn!("channel init failed ({err}); demoting to null channel");
            primary = make_channel(TransportKind::Null, &fabric, &local);
            primary
                .init(wiring.clone())
                .map_err(|err| anyhow!("null channel init failed: {err}"))?;
        }
        let mut fallback = make_channel(TransportKind::Null, &fabric, &local);
        fallback
            .init(wiring.clone())
            .map_err(|err| anyhow!("null channel init failed: {err}"))?;

        let bus = Bus {
            inner: Arc::new(BusInner {
                local,
                fabric,
                caps: self.caps,
                wiring,
                services: Mutex::new(ServiceTable::default()),
                registry: Mutex::new(Registry::default()),
                pending: Mutex::new(PendingCallbacks::default()),
                transport: Mutex::new(Transport { primary, fallback }),
                timers: Mutex::new(TimerQueue::new()),
                clock: self.clock.unwrap_or_else(|| Arc::new(DefaultClock)),
                security: SecurityPolicy {
                    hook: self.hook,
                    violation: self.violation,
                },
                referrer: self.referrer,
                metrics: BusMetrics::default(),
                next_call_id: AtomicU64::new(1),
                inbound_rx,
                ready_rx,
                retry_interval: self.retry_interval,
                retry_budget: self.retry_budget,
            }),
        };

        if let Some(token) = self.auth_token {
            bus.inner.registry.lock().record_mut(PARENT_ID).auth_token = token;
        }
        if self.announce && !bus.is_container() && bus.inner.fabric.contains(PARENT_ID) {
            bus.announce_to_parent();
        }
        Ok(bus)
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
