//! Abstract storage traits for the Vouch review network.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these traits.
//! The rest of the codebase depends only on the traits.

pub mod content;
pub mod did;
pub mod error;
pub mod index;

pub use content::ContentStore;
pub use did::DidStore;
pub use error::StoreError;
pub use index::{AnchorRecord, IndexStore};
