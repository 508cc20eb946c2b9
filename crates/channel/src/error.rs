use thiserror::Error;

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors from the fabric and channel adapters.
///
/// Send-path problems are not errors at this layer; adapters report them
/// through [`SendOutcome`](crate::SendOutcome) so the dispatcher can fall
/// back instead of unwinding.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unknown context: {0}")]
    UnknownContext(String),
}
