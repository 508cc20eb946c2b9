//! Inbound envelope processing: decode, verify, route.

use log::{debug, trace, warn};
use serde_json::json;

use rpc_channel::InboundMessage;
use rpc_wire::{decode, encode, split_sender, Envelope, Value, ACK_SERVICE, CALLBACK_SERVICE};

use crate::security::SecurityAlert;
use crate::services::{CallContext, Responder};
use crate::Bus;

impl Bus {
    /// Handles one raw inbound message end to end. Verification failures
    /// raise through the security hook; whether they also drop the
    /// envelope is the violation policy's call.
    pub(crate) fn process_inbound(&self, message: InboundMessage) {
        let envelope = match decode(&message.raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("dropping malformed envelope: {err}");
                self.inner.metrics.record_malformed();
                return;
            }
        };
        let (sender_id, claimed_origin) = split_sender(&envelope.from);
        let sender_id = sender_id.to_string();

        if let (Some(claimed), Some(verified)) = (claimed_origin, message.provenance.origin.as_deref())
        {
            if claimed != verified {
                self.inner.metrics.record_forged();
                self.inner
                    .security
                    .raise(&sender_id, SecurityAlert::ForgedMessage);
                if self.inner.security.drops_violations() {
                    return;
                }
            }
        }

        if let Some(expected) = self.inner.registry.lock().expected_token(&sender_id) {
            // Exact string comparison; no trimming or coercion.
            if expected != envelope.auth_token {
                self.inner.metrics.record_token_mismatch();
                self.inner
                    .security
                    .raise(&sender_id, SecurityAlert::TokenMismatch);
                if self.inner.security.drops_violations() {
                    return;
                }
            }
        }

        match envelope.service.as_str() {
            ACK_SERVICE => self.process_ack(&sender_id, &envelope),
            CALLBACK_SERVICE => self.process_reply(&envelope),
            _ => self.process_call(sender_id, message.provenance.origin, envelope),
        }
    }

    /// Handshake bookkeeping. A `syn` phase is the peer's opening move and
    /// gets an `ack` back; the `ack` phase only confirms.
    fn process_ack(&self, sender_id: &str, envelope: &Envelope) {
        self.mark_ready(sender_id);
        let phase = envelope.args.first().and_then(Value::as_str).unwrap_or("ack");
        if phase == "syn" {
            let mut reply = Envelope::new(
                ACK_SERVICE,
                self.inner.local.id.clone(),
                vec![json!("ack")],
            );
            // The peer verifies this reply against its own stored token.
            self.stamp_credentials(sender_id, &mut reply);
            match encode(&reply) {
                Ok(raw) => {
                    let _ = self
                        .inner
                        .transport
                        .lock()
                        .primary
                        .call(sender_id, &reply.from, &raw);
                }
                Err(err) => warn!("failed to encode handshake reply: {err}"),
            }
        }
    }

    /// Completes a pending callback. Duplicate or unmatched replies are
    /// logged and dropped, which is what makes callbacks at-most-once.
    fn process_reply(&self, envelope: &Envelope) {
        let Some(call_id) = envelope.args.first().and_then(Value::as_u64) else {
            warn!("callback envelope without a correlated id");
            self.inner.metrics.record_malformed();
            return;
        };
        let value = envelope.args.get(1).cloned().unwrap_or(Value::Null);
        // Take the entry out before invoking it: the callback may itself
        // issue calls that need the pending table.
        let entry = self.inner.pending.lock().take(call_id);
        match entry {
            Some(entry) => {
                trace!("completing callback {call_id} from {}", entry.target);
                (entry.complete)(value);
            }
            None => debug!("no pending callback for id {call_id}"),
        }
    }

    /// Dispatches a service call to its handler. A synchronous return
    /// value replies only while the handler has not already claimed the
    /// responder, so each call answers at most once.
    fn process_call(&self, sender_id: String, origin: Option<String>, envelope: Envelope) {
        let handler = self.inner.services.lock().lookup(&envelope.service);
        let Some(handler) = handler else {
            debug!(
                "no handler for service {:?} from {sender_id}",
                envelope.service
            );
            return;
        };
        let call_id = envelope.call_id;
        let mut ctx = CallContext {
            from: sender_id.clone(),
            origin,
            call_id,
            referrer: envelope.referrer.clone(),
            responder: (call_id != 0).then(|| Responder {
                bus: self.clone(),
                target: sender_id,
                call_id,
            }),
        };
        let returned = handler(&mut ctx, &envelope.args);
        if let Some(value) = returned {
            if let Some(responder) = ctx.responder.take() {
                responder.send(value);
            }
        }
    }
}
