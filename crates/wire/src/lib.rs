#![deny(missing_docs)]
//! Wire format shared by every channel implementation.
//!
//! This crate defines the pieces of the bus that travel between isolated
//! contexts as opaque strings:
//! * [`Envelope`] – the unit of wire transfer, with single-letter JSON keys.
//! * [`encode`] / [`decode`] – the string codec, including the legacy
//!   positional sub-format.
//! * [`Provenance`] – transport-verified sender data, populated only by the
//!   receiving side.
//! * Reserved service names and peer-id helpers.

mod envelope;
mod error;
pub mod names;

pub use envelope::{decode, encode, Envelope, Provenance};
pub use error::{WireError, WireResult};
pub use names::{
    is_reserved_service, qualify_sender, split_sender, ACK_SERVICE, CALLBACK_SERVICE,
    DEFAULT_SERVICE, PARENT_ID, SIBLING_SEPARATOR,
};

/// JSON value type carried in envelope argument lists.
pub type Value = serde_json::Value;
