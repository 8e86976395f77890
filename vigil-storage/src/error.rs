use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A backend lock was poisoned by a panicking reader or writer.
    #[error("lock poisoned: {reason}")]
    LockPoisoned { reason: String },

    #[error("RocksDB error: {reason}")]
    RocksDbError { reason: String },

    #[error("missing column family: {name}")]
    MissingColumn { name: &'static str },

    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("deserialization error: {reason}")]
    DeserializationError { reason: String },
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDbError {
            reason: err.into_string(),
        }
    }
}
