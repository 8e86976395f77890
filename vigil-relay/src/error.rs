use thiserror::Error;

/// Errors that can occur in the relay layer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A general network-level error.
    #[error("network error: {reason}")]
    NetworkError { reason: String },

    /// Failed to encode or decode a frame.
    #[error("codec error: {reason}")]
    CodecError { reason: String },

    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A signed gossip message failed verification.
    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// The signer is not part of the current guardian set.
    #[error("unknown guardian: {addr}")]
    UnknownGuardian { addr: String },
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::NetworkError {
            reason: err.to_string(),
        }
    }
}
