//! Vigil guardian node: configuration, wiring and metrics.
//!
//! The `vigil` binary is a thin CLI over [`node::Node`].

pub mod config;
pub mod error;
pub mod metrics;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
