//! Observation aggregation for the Vigil guardian node.
//!
//! The [`Processor`] owns every in-flight observation. It signs what the local
//! watchers report, collects signatures gossiped by other guardians, and emits
//! a quorum-signed VAA exactly once per digest. The chain governor and an
//! optional accountant gate publication.

pub mod accountant;
mod cleanup;
pub mod config;
pub mod error;
mod observation;
pub mod processor;
pub mod state;
#[cfg(test)]
mod testing;

pub use processor::{Processor, ProcessorInputs};
