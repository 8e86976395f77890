//! Shared type definitions for the Vigil guardian node.
//!
//! Everything that crosses a crate boundary lives here: the VAA wire format,
//! guardian sets and their registry, observations, and the gossip envelope.

pub mod chain;
pub mod constants;
pub mod error;
pub mod gossip;
pub mod guardian_set;
pub mod message;
pub mod observation;
pub mod primitives;
pub mod token;
pub mod vaa;
