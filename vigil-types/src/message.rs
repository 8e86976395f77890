use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::chain::ChainId;
use crate::constants::VAA_VERSION;
use crate::primitives::{Address, Hash};
use crate::vaa::Vaa;

/// A message observed on a source chain by a watcher.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MessagePublication {
    /// Transaction that emitted the message, used for re-observation.
    pub tx_hash: Hash,
    pub timestamp: u32,
    pub nonce: u32,
    pub sequence: u64,
    pub consistency_level: u8,
    pub emitter_chain: ChainId,
    pub emitter_address: Address,
    pub payload: Vec<u8>,
}

impl MessagePublication {
    pub fn message_id(&self) -> MessageId {
        MessageId {
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
        }
    }

    /// Build the unsigned VAA for this message under the given guardian set.
    pub fn create_vaa(&self, guardian_set_index: u32) -> Vaa {
        Vaa {
            version: VAA_VERSION,
            guardian_set_index,
            signatures: Vec::new(),
            timestamp: self.timestamp,
            nonce: self.nonce,
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
            consistency_level: self.consistency_level,
            payload: self.payload.clone(),
        }
    }
}

/// Unique identifier of an observation: `(emitter_chain, emitter_address, sequence)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct MessageId {
    pub emitter_chain: ChainId,
    pub emitter_address: Address,
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.emitter_chain.0,
            hex::encode(self.emitter_address),
            self.sequence
        )
    }
}
