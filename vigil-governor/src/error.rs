use thiserror::Error;
use vigil_types::error::VigilError;

/// Errors raised by the chain governor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GovernorError {
    #[error("invalid governor config: {reason}")]
    InvalidConfig { reason: String },

    /// The message claims to be a transfer but its payload does not parse.
    #[error("malformed transfer payload: {0}")]
    MalformedPayload(#[from] VigilError),

    #[error("price fetch failed: {reason}")]
    PriceFetch { reason: String },
}
