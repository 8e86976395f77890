use crate::constants::SIGNATURE_LENGTH;
use crate::error::VigilError;

/// 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// 20-byte guardian address: the last 20 bytes of Keccak-256 over the
/// uncompressed secp256k1 public key (without the `0x04` tag).
pub type GuardianAddress = [u8; 20];

/// 65-byte recoverable secp256k1 signature, `r || s || recovery_id`.
pub type Signature = [u8; SIGNATURE_LENGTH];

/// 32-byte emitter or token address, left-padded with zeros.
pub type Address = [u8; 32];

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Current UNIX timestamp in seconds.
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parse a hex string (with or without `0x`) into a left-padded 32-byte address.
pub fn address_from_hex(s: &str) -> Result<Address, VigilError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() > 64 {
        return Err(VigilError::InvalidAddress {
            reason: format!("address too long: {} hex chars", s.len()),
        });
    }
    // hex requires an even number of digits
    let padded = if s.len() % 2 == 1 {
        format!("0{s}")
    } else {
        s.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| VigilError::InvalidAddress {
        reason: e.to_string(),
    })?;
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Parse a 20-byte guardian address from hex.
pub fn guardian_address_from_hex(s: &str) -> Result<GuardianAddress, VigilError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| VigilError::InvalidAddress {
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|v: Vec<u8>| VigilError::InvalidAddress {
        reason: format!("expected 20 bytes, got {}", v.len()),
    })
}

/// Format a guardian address as `0x`-prefixed hex.
pub fn guardian_address_to_hex(addr: &GuardianAddress) -> String {
    format!("0x{}", hex::encode(addr))
}
