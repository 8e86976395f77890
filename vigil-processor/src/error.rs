use thiserror::Error;
use vigil_types::error::VigilError;

/// Errors reported by an accountant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountantError {
    #[error("accountant unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("accountant rejected {message_id}: {reason}")]
    Rejected { message_id: String, reason: String },
}

/// Errors that stop the processor. Everything recoverable is logged and
/// handled inside the loop instead.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("no guardian set installed")]
    MissingGuardianSet,

    /// The governor released a message it does not classify as governed.
    #[error("governor bypass for {message_id}: {reason}")]
    GovernorBypass { message_id: String, reason: String },

    #[error("attempted second emission of digest {digest}")]
    DoubleEmission { digest: String },

    #[error("accountant error: {0}")]
    Accountant(#[from] AccountantError),

    #[error("received an accountant release but no accountant is configured")]
    AccountantNotConfigured,

    #[error("signing failed: {0}")]
    Signing(VigilError),
}
