use thiserror::Error;

/// Errors that stop the node.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NodeError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("storage error: {0}")]
    StorageError(#[from] vigil_storage::error::StorageError),

    #[error("relay error: {0}")]
    RelayError(#[from] vigil_relay::error::RelayError),

    #[error("governor error: {0}")]
    GovernorError(#[from] vigil_governor::error::GovernorError),

    /// The processor hit a condition that must stop the node.
    #[error("processor error: {0}")]
    ProcessorError(#[from] vigil_processor::error::ProcessorError),

    #[error("task error: {reason}")]
    TaskError { reason: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
