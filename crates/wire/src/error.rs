use thiserror::Error;

/// Convenience alias for wire codec results.
pub type WireResult<T> = Result<T, WireError>;

/// Errors surfaced while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload is not a recognizable envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The payload parsed but a required field is missing or mistyped.
    #[error("envelope missing required field `{0}`")]
    MissingField(&'static str),
}
