use thiserror::Error;

use rpc_channel::ChannelError;
use rpc_wire::WireError;

/// Convenience alias for bus results.
pub type BusResult<T> = Result<T, BusError>;

/// Errors surfaced synchronously at the point of misuse.
///
/// Transport, handshake, and security failures never appear here; those are
/// recovered locally and reported through the security policy hook.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("service name is reserved: {0:?}")]
    ReservedService(String),

    #[error("invalid peer id: {0:?}")]
    InvalidPeerId(String),

    #[error("invalid referrer policy: {0:?}")]
    InvalidReferrerPolicy(String),

    #[error("host has no origin-verifiable transport")]
    NoVerifiableTransport,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
