//! Gossip transport for the Vigil guardian node.
//!
//! Length-delimited borsh frames over TCP, an explicit fan-out component for
//! one-to-many channel delivery, and the inbound router that validates and
//! hands gossip to the processor.

pub mod codec;
pub mod config;
pub mod error;
pub mod fanout;
pub mod relay;
pub mod router;
