use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::StorageError;
use crate::traits::{Column, KvStore};

const SNAPSHOT_KEY: &[u8] = b"governor:snapshot";

/// Persists the governor's ledger and pending queue across restarts.
///
/// The snapshot type is opaque to storage; it is written on shutdown and read
/// once on start.
pub struct GovernorStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> GovernorStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save_snapshot<T: BorshSerialize>(&self, snapshot: &T) -> Result<(), StorageError> {
        let bytes = borsh::to_vec(snapshot).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        self.store.put(Column::Governor, SNAPSHOT_KEY, &bytes)?;
        tracing::debug!(bytes = bytes.len(), "saved governor snapshot");
        Ok(())
    }

    pub fn load_snapshot<T: BorshDeserialize>(&self) -> Result<Option<T>, StorageError> {
        match self.store.get(Column::Governor, SNAPSHOT_KEY)? {
            Some(bytes) => {
                let snapshot =
                    T::try_from_slice(&bytes).map_err(|e| StorageError::DeserializationError {
                        reason: e.to_string(),
                    })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}
