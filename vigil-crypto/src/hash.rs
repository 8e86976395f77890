use sha3::{Digest, Keccak256};
use vigil_types::constants::SIGNED_OBSERVATION_REQUEST_PREFIX;
use vigil_types::primitives::Hash;
use vigil_types::vaa::Vaa;

/// Compute the Keccak-256 hash of the given data.
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Hash of a VAA body.
pub fn vaa_body_hash(vaa: &Vaa) -> Hash {
    keccak256(&vaa.body_bytes())
}

/// The digest guardians sign for a VAA: `keccak256(keccak256(body))`.
///
/// Also the key under which observations are aggregated.
pub fn vaa_signing_digest(vaa: &Vaa) -> Hash {
    keccak256(&vaa_body_hash(vaa))
}

/// Domain-separated digest of a serialized observation request.
pub fn observation_request_digest(request: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(SIGNED_OBSERVATION_REQUEST_PREFIX);
    hasher.update(request);
    hasher.finalize().into()
}
