//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of a node (clock, storage, blockchain, network)
//! sits behind a trait. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod clock;
pub mod store;
pub mod transport;

pub use chain::NullChainOracle;
pub use clock::NullClock;
pub use store::{NullContentStore, NullDidStore, NullIndexStore};
pub use transport::NullTransport;
