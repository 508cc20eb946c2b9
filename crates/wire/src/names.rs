//! Reserved service names and peer-id conventions frozen for the wire.
//!
//! Any change here is a protocol break: both ends of a channel must agree on
//! the sentinels before a single envelope is exchanged.

/// Service name routed to the default handler.
pub const DEFAULT_SERVICE: &str = "";
/// Pseudo-service carrying reply values back to a pending callback.
pub const CALLBACK_SERVICE: &str = "__cb";
/// Pseudo-service acknowledging that a peer's channel end is ready.
pub const ACK_SERVICE: &str = "__ack";

/// Peer id addressing the container/parent context.
pub const PARENT_ID: &str = "..";

/// Separator between a sibling's local id and its verified origin.
///
/// `|` cannot appear in an origin, so splitting stays unambiguous.
pub const SIBLING_SEPARATOR: char = '|';

/// Returns true for service names the bus reserves for itself.
pub fn is_reserved_service(name: &str) -> bool {
    name == DEFAULT_SERVICE || name == CALLBACK_SERVICE || name == ACK_SERVICE
}

/// Builds a qualified sender identity for sibling-addressed calls.
pub fn qualify_sender(id: &str, origin: &str) -> String {
    format!("{id}{SIBLING_SEPARATOR}{origin}")
}

/// Splits a `from` field into its local id and optional claimed origin.
pub fn split_sender(from: &str) -> (&str, Option<&str>) {
    match from.split_once(SIBLING_SEPARATOR) {
        Some((id, origin)) => (id, Some(origin)),
        None => (from, None),
    }
}
