pub mod hash;
pub mod keys;
pub mod vaa;
