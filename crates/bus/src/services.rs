//! Service table and the handler-side call context.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use rpc_wire::{is_reserved_service, Value};

use crate::error::{BusError, BusResult};
use crate::Bus;

/// A registered service handler.
///
/// Returning `Some(value)` completes the call synchronously when the caller
/// asked for a reply; handlers that finish later take the
/// [`Responder`] out of the context instead. Exactly one of the two paths
/// fires: taking the responder removes the synchronous path.
pub type Handler = Arc<dyn Fn(&mut CallContext, &[Value]) -> Option<Value> + Send + Sync>;

#[derive(Default)]
pub(crate) struct ServiceTable {
    services: HashMap<String, Handler>,
    default: Option<Handler>,
}

impl ServiceTable {
    pub fn register(&mut self, name: &str, handler: Handler) -> BusResult<()> {
        if is_reserved_service(name) {
            return Err(BusError::ReservedService(name.to_string()));
        }
        self.services.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> BusResult<()> {
        if is_reserved_service(name) {
            return Err(BusError::ReservedService(name.to_string()));
        }
        self.services.remove(name);
        Ok(())
    }

    pub fn register_default(&mut self, handler: Handler) {
        self.default = Some(handler);
    }

    pub fn unregister_default(&mut self) {
        self.default = None;
    }

    /// Exact match first, then the default handler.
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.services
            .get(name)
            .or(self.default.as_ref())
            .cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

/// Request context passed to service handlers.
pub struct CallContext {
    /// Sender's unqualified peer id.
    pub from: String,
    /// Transport-verified origin of the sender, when the channel could
    /// verify one.
    pub origin: Option<String>,
    /// Correlation id of the call; 0 when no reply is expected.
    pub call_id: u64,
    /// Referrer attached by the sender per its policy.
    pub referrer: Option<String>,
    pub(crate) responder: Option<Responder>,
}

impl CallContext {
    /// Takes the one-shot responder for asynchronous completion.
    ///
    /// Returns `None` when the caller did not ask for a reply, or when the
    /// responder was already taken.
    pub fn responder(&mut self) -> Option<Responder> {
        self.responder.take()
    }
}

/// One-shot handle completing a call after the handler has returned.
pub struct Responder {
    pub(crate) bus: Bus,
    pub(crate) target: String,
    pub(crate) call_id: u64,
}

impl Responder {
    /// Sends `value` back to the caller, consuming the responder.
    pub fn send(self, value: Value) {
        debug!(
            "async reply for call {} to {}",
            self.call_id, self.target
        );
        self.bus.send_reply(&self.target, self.call_id, value);
    }
}
