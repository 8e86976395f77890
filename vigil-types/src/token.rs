//! Token bridge transfer payloads.

use crate::chain::ChainId;
use crate::constants::TRANSFER_PAYLOAD_MIN_LENGTH;
use crate::error::VigilError;
use crate::primitives::Address;

/// Plain token transfer.
pub const PAYLOAD_TRANSFER: u8 = 1;
/// Token transfer carrying an arbitrary payload for the recipient contract.
pub const PAYLOAD_TRANSFER_WITH_PAYLOAD: u8 = 3;

/// The fixed header shared by both transfer payload types.
///
/// Layout: `type:u8 | amount:32 | origin_address:32 | origin_chain:u16 |
/// target_address:32 | target_chain:u16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayloadHdr {
    pub payload_type: u8,
    /// Big-endian 256-bit amount, normalised to at most 8 decimals.
    pub amount: [u8; 32],
    pub origin_address: Address,
    pub origin_chain: ChainId,
    pub target_address: Address,
    pub target_chain: ChainId,
}

/// Whether `payload` is one of the token bridge transfer types.
pub fn is_transfer(payload: &[u8]) -> bool {
    matches!(
        payload.first(),
        Some(&PAYLOAD_TRANSFER) | Some(&PAYLOAD_TRANSFER_WITH_PAYLOAD)
    )
}

impl TransferPayloadHdr {
    pub fn decode(payload: &[u8]) -> Result<Self, VigilError> {
        if payload.len() < TRANSFER_PAYLOAD_MIN_LENGTH {
            return Err(VigilError::PayloadTooShort {
                len: payload.len(),
                need: TRANSFER_PAYLOAD_MIN_LENGTH,
            });
        }
        let payload_type = payload[0];
        if !is_transfer(payload) {
            return Err(VigilError::NotATransfer { payload_type });
        }

        let mut amount = [0u8; 32];
        amount.copy_from_slice(&payload[1..33]);
        let mut origin_address = [0u8; 32];
        origin_address.copy_from_slice(&payload[33..65]);
        let origin_chain = ChainId(u16::from_be_bytes([payload[65], payload[66]]));
        let mut target_address = [0u8; 32];
        target_address.copy_from_slice(&payload[67..99]);
        let target_chain = ChainId(u16::from_be_bytes([payload[99], payload[100]]));

        Ok(Self {
            payload_type,
            amount,
            origin_address,
            origin_chain,
            target_address,
            target_chain,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TRANSFER_PAYLOAD_MIN_LENGTH);
        out.push(self.payload_type);
        out.extend_from_slice(&self.amount);
        out.extend_from_slice(&self.origin_address);
        out.extend_from_slice(&self.origin_chain.0.to_be_bytes());
        out.extend_from_slice(&self.target_address);
        out.extend_from_slice(&self.target_chain.0.to_be_bytes());
        out
    }

    /// The amount as a float. Precision loss above 2^53 is acceptable for
    /// notional valuation.
    pub fn amount_f64(&self) -> f64 {
        self.amount
            .iter()
            .fold(0f64, |acc, &b| acc * 256.0 + f64::from(b))
    }
}

/// Encode a `u128` as a 32-byte big-endian amount.
pub fn amount_from_u128(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdr(amount: u128) -> TransferPayloadHdr {
        TransferPayloadHdr {
            payload_type: PAYLOAD_TRANSFER,
            amount: amount_from_u128(amount),
            origin_address: [0xddu8; 32],
            origin_chain: ChainId::ETHEREUM,
            target_address: [0x70u8; 32],
            target_chain: ChainId::POLYGON,
        }
    }

    #[test]
    fn test_decode_roundtrip() {
        let h = hdr(125_000_000);
        let bytes = h.encode();
        assert_eq!(bytes.len(), TRANSFER_PAYLOAD_MIN_LENGTH);
        assert_eq!(TransferPayloadHdr::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn test_decode_with_trailing_payload() {
        let mut h = hdr(1);
        h.payload_type = PAYLOAD_TRANSFER_WITH_PAYLOAD;
        let mut bytes = h.encode();
        bytes.extend_from_slice(&[0xaa; 40]);
        assert_eq!(TransferPayloadHdr::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = TransferPayloadHdr::decode(&[1u8]).unwrap_err();
        assert!(err.to_string().starts_with("buffer too short"));
    }

    #[test]
    fn test_decode_wrong_type() {
        let mut bytes = hdr(1).encode();
        bytes[0] = 2;
        assert_eq!(
            TransferPayloadHdr::decode(&bytes).unwrap_err(),
            VigilError::NotATransfer { payload_type: 2 }
        );
    }

    #[test]
    fn test_is_transfer() {
        assert!(is_transfer(&[1]));
        assert!(is_transfer(&[3, 0]));
        assert!(!is_transfer(&[2]));
        assert!(!is_transfer(&[]));
    }

    #[test]
    fn test_amount_f64() {
        assert_eq!(hdr(125_000_000).amount_f64(), 125_000_000.0);
        assert_eq!(hdr(0).amount_f64(), 0.0);
        assert_eq!(hdr(1u128 << 100).amount_f64(), 2f64.powi(100));
    }
}
