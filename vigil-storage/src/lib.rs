//! Storage abstraction for the Vigil guardian node.
//!
//! A column-aware [`KvStore`](traits::KvStore) trait with in-memory and RocksDB
//! backends, plus typed stores for signed VAAs and governor state.

pub mod error;
pub mod governor_store;
pub mod memory;
pub mod rocksdb;
pub mod traits;
pub mod vaa_store;
