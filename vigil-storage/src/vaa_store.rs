use vigil_types::chain::ChainId;
use vigil_types::message::MessageId;
use vigil_types::primitives::Address;
use vigil_types::vaa::Vaa;

use crate::error::StorageError;
use crate::traits::{Column, KvStore};

/// Persistent store for quorum-signed VAAs.
///
/// Key layout: `emitter_chain:u16 BE | emitter_address:32 | sequence:u64 BE`,
/// so a prefix scan over `(chain, emitter)` yields VAAs in sequence order.
pub struct VaaStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> VaaStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(id: &MessageId) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + 32 + 8);
        key.extend_from_slice(&id.emitter_chain.0.to_be_bytes());
        key.extend_from_slice(&id.emitter_address);
        key.extend_from_slice(&id.sequence.to_be_bytes());
        key
    }

    /// Persist a signed VAA under its message id. Re-storing overwrites.
    pub fn store_signed_vaa(&self, vaa: &Vaa) -> Result<(), StorageError> {
        let bytes = vaa.to_bytes().map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })?;
        self.store.put(Column::Vaas, &Self::key(&vaa.message_id()), &bytes)
    }

    pub fn get_signed_vaa(&self, id: &MessageId) -> Result<Option<Vaa>, StorageError> {
        match self.store.get(Column::Vaas, &Self::key(id))? {
            Some(bytes) => {
                let vaa =
                    Vaa::from_bytes(&bytes).map_err(|e| StorageError::DeserializationError {
                        reason: e.to_string(),
                    })?;
                Ok(Some(vaa))
            }
            None => Ok(None),
        }
    }

    pub fn has_signed_vaa(&self, id: &MessageId) -> Result<bool, StorageError> {
        self.store.exists(Column::Vaas, &Self::key(id))
    }

    /// All stored VAAs of one emitter, in ascending sequence order.
    pub fn vaas_for_emitter(
        &self,
        chain: ChainId,
        emitter: &Address,
    ) -> Result<Vec<Vaa>, StorageError> {
        let mut prefix = Vec::with_capacity(34);
        prefix.extend_from_slice(&chain.0.to_be_bytes());
        prefix.extend_from_slice(emitter);
        self.store
            .prefix_scan(Column::Vaas, &prefix)?
            .into_iter()
            .map(|(_, bytes)| {
                Vaa::from_bytes(&bytes).map_err(|e| StorageError::DeserializationError {
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
