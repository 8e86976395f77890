/// The only VAA version this node understands.
pub const VAA_VERSION: u8 = 1;

/// Length of a VAA with no signatures and an empty payload.
pub const MIN_VAA_LENGTH: usize = 57;

/// Length of one signature record inside a VAA (`index:u8 | sig:65`).
pub const SIGNATURE_RECORD_LENGTH: usize = 1 + SIGNATURE_LENGTH;

/// Length of a recoverable secp256k1 signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Domain prefix for signed re-observation requests.
pub const SIGNED_OBSERVATION_REQUEST_PREFIX: &[u8] = b"signed_observation_request|";

/// Maximum gossip frame body (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// How long a superseded guardian set keeps validating signatures (24 hours).
pub const GUARDIAN_SET_GRACE_PERIOD: u64 = 24 * 60 * 60;

/// Minimum length of a token bridge transfer payload.
pub const TRANSFER_PAYLOAD_MIN_LENGTH: usize = 101;

/// Token bridge amounts carry at most this many decimals on the wire.
pub const MAX_BRIDGE_DECIMALS: u8 = 8;
