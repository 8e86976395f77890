//! The VAA ("verified action approval"): a quorum-signed attestation.
//!
//! Wire format, all integers big-endian:
//!
//! ```text
//! version:u8 | guardian_set_index:u32 | num_signatures:u8
//!   | num_signatures × (guardian_index:u8 | signature:65)
//!   | timestamp:u32 | nonce:u32 | emitter_chain:u16 | emitter_address:32
//!   | sequence:u64 | consistency_level:u8 | payload
//! ```
//!
//! Everything from `timestamp` on is the *body*; guardians sign the body's
//! double Keccak-256 hash.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::chain::ChainId;
use crate::constants::{MIN_VAA_LENGTH, SIGNATURE_RECORD_LENGTH, VAA_VERSION};
use crate::error::VigilError;
use crate::message::MessageId;
use crate::primitives::{Address, Signature};

/// Length of the fixed part of the body (before the payload).
const BODY_HEADER_LENGTH: usize = 4 + 4 + 2 + 32 + 8 + 1;

/// Length of `version | guardian_set_index | num_signatures`.
const HEADER_LENGTH: usize = 1 + 4 + 1;

/// One guardian's signature inside a VAA.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VaaSignature {
    /// Position of the signer in the guardian set.
    pub index: u8,
    pub signature: Signature,
}

/// A quorum-signed (or not yet signed) attestation.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vaa {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<VaaSignature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: ChainId,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl Vaa {
    /// Identifier `(chain, emitter, sequence)` of the attested message.
    pub fn message_id(&self) -> MessageId {
        MessageId {
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
        }
    }

    /// Serialize the signable body.
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BODY_HEADER_LENGTH + self.payload.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.emitter_chain.0.to_be_bytes());
        out.extend_from_slice(&self.emitter_address);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.consistency_level);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VigilError> {
        let count = self.signatures.len();
        if count > u8::MAX as usize {
            return Err(VigilError::TooManySignatures { count });
        }
        let body = self.body_bytes();
        let mut out = Vec::with_capacity(HEADER_LENGTH + count * SIGNATURE_RECORD_LENGTH + body.len());
        out.push(self.version);
        out.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        out.push(count as u8);
        for sig in &self.signatures {
            out.push(sig.index);
            out.extend_from_slice(&sig.signature);
        }
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode from the wire format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, VigilError> {
        if data.len() < MIN_VAA_LENGTH {
            return Err(VigilError::VaaTooShort {
                len: data.len(),
                min: MIN_VAA_LENGTH,
            });
        }

        let version = data[0];
        if version != VAA_VERSION {
            return Err(VigilError::UnsupportedVaaVersion { version });
        }

        let guardian_set_index = u32::from_be_bytes(read_array(data, 1));
        let count = data[5] as usize;

        let body_start = HEADER_LENGTH + count * SIGNATURE_RECORD_LENGTH;
        let min = body_start + BODY_HEADER_LENGTH;
        if data.len() < min {
            return Err(VigilError::VaaTooShort {
                len: data.len(),
                min,
            });
        }

        let mut signatures = Vec::with_capacity(count);
        for i in 0..count {
            let at = HEADER_LENGTH + i * SIGNATURE_RECORD_LENGTH;
            signatures.push(VaaSignature {
                index: data[at],
                signature: read_array(data, at + 1),
            });
        }

        let mut at = body_start;
        let timestamp = u32::from_be_bytes(read_array(data, at));
        at += 4;
        let nonce = u32::from_be_bytes(read_array(data, at));
        at += 4;
        let emitter_chain = ChainId(u16::from_be_bytes(read_array(data, at)));
        at += 2;
        let emitter_address: Address = read_array(data, at);
        at += 32;
        let sequence = u64::from_be_bytes(read_array(data, at));
        at += 8;
        let consistency_level = data[at];
        at += 1;

        Ok(Vaa {
            version,
            guardian_set_index,
            signatures,
            timestamp,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level,
            payload: data[at..].to_vec(),
        })
    }
}

/// Copy `N` bytes starting at `at`. Callers check bounds first.
fn read_array<const N: usize>(data: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[at..at + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_vaa() -> Vaa {
        Vaa {
            version: VAA_VERSION,
            guardian_set_index: 9,
            signatures: vec![
                VaaSignature {
                    index: 0,
                    signature: [1u8; 65],
                },
                VaaSignature {
                    index: 3,
                    signature: [2u8; 65],
                },
            ],
            timestamp: 1_654_000_000,
            nonce: 42,
            emitter_chain: ChainId::ETHEREUM,
            emitter_address: [7u8; 32],
            sequence: 123_456,
            consistency_level: 15,
            payload: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let vaa = sample_vaa();
        let bytes = vaa.to_bytes().unwrap();
        assert_eq!(bytes.len(), MIN_VAA_LENGTH + 2 * SIGNATURE_RECORD_LENGTH + 5);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &9u32.to_be_bytes());
        assert_eq!(bytes[5], 2);
        assert_eq!(bytes[6], 0);
        assert_eq!(bytes[72], 3);
        assert_eq!(&bytes[bytes.len() - 5..], b"hello");
    }

    #[test]
    fn test_minimum_length_vaa() {
        let vaa = Vaa {
            signatures: vec![],
            payload: vec![],
            ..sample_vaa()
        };
        let bytes = vaa.to_bytes().unwrap();
        assert_eq!(bytes.len(), MIN_VAA_LENGTH);
        assert_eq!(Vaa::from_bytes(&bytes).unwrap(), vaa);
    }

    #[test]
    fn test_decode_too_short() {
        let err = Vaa::from_bytes(&[1u8; 56]).unwrap_err();
        assert_eq!(err, VigilError::VaaTooShort { len: 56, min: 57 });
    }

    #[test]
    fn test_decode_truncated_signatures() {
        let mut bytes = sample_vaa().to_bytes().unwrap();
        // Claim more signatures than the buffer holds.
        bytes[5] = 200;
        assert!(matches!(
            Vaa::from_bytes(&bytes),
            Err(VigilError::VaaTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_unsupported_version() {
        let mut bytes = sample_vaa().to_bytes().unwrap();
        bytes[0] = 2;
        assert_eq!(
            Vaa::from_bytes(&bytes).unwrap_err(),
            VigilError::UnsupportedVaaVersion { version: 2 }
        );
    }

    #[test]
    fn test_body_bytes_is_suffix() {
        let vaa = sample_vaa();
        let bytes = vaa.to_bytes().unwrap();
        let body = vaa.body_bytes();
        assert!(bytes.ends_with(&body));
    }

    #[test]
    fn test_message_id() {
        let id = sample_vaa().message_id();
        assert_eq!(id.emitter_chain, ChainId::ETHEREUM);
        assert_eq!(id.sequence, 123_456);
    }

    proptest! {
        #[test]
        fn prop_vaa_roundtrip(
            gs_index in any::<u32>(),
            sig_indices in proptest::collection::vec(any::<u8>(), 0..20),
            timestamp in any::<u32>(),
            nonce in any::<u32>(),
            chain in any::<u16>(),
            emitter in any::<[u8; 32]>(),
            sequence in any::<u64>(),
            consistency in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let vaa = Vaa {
                version: VAA_VERSION,
                guardian_set_index: gs_index,
                signatures: sig_indices
                    .iter()
                    .map(|&index| VaaSignature { index, signature: [index; 65] })
                    .collect(),
                timestamp,
                nonce,
                emitter_chain: ChainId(chain),
                emitter_address: emitter,
                sequence,
                consistency_level: consistency,
                payload,
            };
            let bytes = vaa.to_bytes().unwrap();
            prop_assert_eq!(Vaa::from_bytes(&bytes).unwrap(), vaa);
        }
    }
}
