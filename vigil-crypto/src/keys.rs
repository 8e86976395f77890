use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use vigil_types::error::VigilError;
use vigil_types::primitives::{GuardianAddress, Hash, Signature};
use zeroize::Zeroize;

use crate::hash::keccak256;

/// A guardian's secp256k1 signing key.
#[derive(Clone)]
pub struct GuardianKey {
    inner: SigningKey,
}

impl GuardianKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Load a key from its 32-byte secret scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, VigilError> {
        let inner = SigningKey::from_slice(bytes).map_err(|_| VigilError::InvalidKeyMaterial)?;
        Ok(Self { inner })
    }

    /// Load a key from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, VigilError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = hex::decode(s).map_err(|_| VigilError::InvalidKeyMaterial)?;
        let result = match <[u8; 32]>::try_from(bytes.as_slice()) {
            Ok(arr) => Self::from_bytes(&arr),
            Err(_) => Err(VigilError::InvalidKeyMaterial),
        };
        bytes.zeroize();
        result
    }

    /// The 32-byte secret scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = self.to_bytes();
        let out = hex::encode(bytes);
        bytes.zeroize();
        out
    }

    pub fn address(&self) -> GuardianAddress {
        pubkey_to_address(self.inner.verifying_key())
    }

    /// Sign a 32-byte prehashed digest, returning `r || s || recovery_id`.
    pub fn sign(&self, digest: &Hash) -> Result<Signature, VigilError> {
        let (sig, recid) = self
            .inner
            .sign_prehash_recoverable(digest)
            .map_err(|e| VigilError::SigningFailed {
                reason: e.to_string(),
            })?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte();
        Ok(out)
    }
}

impl std::fmt::Debug for GuardianKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardianKey")
            .field("address", &hex::encode(self.address()))
            .finish_non_exhaustive()
    }
}

/// Derive the guardian address from a public key: the last 20 bytes of
/// Keccak-256 over the uncompressed point without its tag byte.
pub fn pubkey_to_address(key: &VerifyingKey) -> GuardianAddress {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    addr
}

/// Recover the address that produced `signature` over `digest`.
pub fn recover_address(digest: &Hash, signature: &Signature) -> Result<GuardianAddress, VigilError> {
    let recid = RecoveryId::from_byte(signature[64]).ok_or_else(|| VigilError::RecoveryFailed {
        reason: format!("invalid recovery id {}", signature[64]),
    })?;
    let sig = k256::ecdsa::Signature::from_slice(&signature[..64]).map_err(|e| {
        VigilError::RecoveryFailed {
            reason: e.to_string(),
        }
    })?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recid).map_err(|e| {
        VigilError::RecoveryFailed {
            reason: e.to_string(),
        }
    })?;
    Ok(pubkey_to_address(&key))
}
