//! LMDB storage backend for the Vouch review network.
//!
//! Implements the storage traits from `vouch-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more named databases within a single environment.

pub mod content;
pub mod did;
pub mod environment;
pub mod error;
pub mod index;
pub mod integrity;

pub use content::LmdbContentStore;
pub use did::LmdbDidStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use index::LmdbIndexStore;
pub use integrity::{check_integrity, IntegrityReport};
