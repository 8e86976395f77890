use thiserror::Error;

/// Errors shared by the Vigil protocol crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VigilError {
    // ─── VAA Codec Errors ────────────────────────────────────────────────────
    #[error("VAA is too short: {len} bytes (min {min})")]
    VaaTooShort { len: usize, min: usize },

    #[error("unsupported VAA version: {version}")]
    UnsupportedVaaVersion { version: u8 },

    #[error("VAA has too many signatures: {count}")]
    TooManySignatures { count: usize },

    // ─── Payload Errors ──────────────────────────────────────────────────────
    #[error("buffer too short: {len} bytes (need {need})")]
    PayloadTooShort { len: usize, need: usize },

    #[error("not a token transfer payload: type {payload_type}")]
    NotATransfer { payload_type: u8 },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    // ─── Guardian Set Errors ─────────────────────────────────────────────────
    #[error("guardian set index mismatch: VAA signed by set {vaa}, verifying against set {set}")]
    GuardianSetMismatch { vaa: u32, set: u32 },

    #[error("guardian index {index} out of range for set of size {size}")]
    UnknownGuardianIndex { index: u8, size: usize },

    #[error("signatures not in strictly ascending guardian order at position {position}")]
    SignaturesNotAscending { position: usize },

    #[error("not enough signatures: have {have}, need {need}")]
    NoQuorum { have: usize, need: usize },

    // ─── Crypto Errors ───────────────────────────────────────────────────────
    #[error("invalid key material")]
    InvalidKeyMaterial,

    #[error("invalid signature: signer {signer_index}")]
    InvalidSignature { signer_index: usize },

    #[error("public key recovery failed: {reason}")]
    RecoveryFailed { reason: String },

    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },
}
