//! Chain governor for the Vigil guardian node.
//!
//! Bounds the USD notional value of token bridge transfers leaving each chain
//! within a rolling window. Transfers that would exceed the limit wait in a
//! per-chain FIFO queue until enough earlier value ages out.

pub mod coingecko;
pub mod config;
pub mod error;
pub mod governor;
pub mod prices;
pub mod token;

pub use governor::ChainGovernor;
