//! Error handling for the catalog store
//!
//! Re-exports the error types and the result aliases used throughout the
//! crate.

pub mod types;

pub use types::{CatalogError, CodecError, StoreError};

/// Result alias for operations that can fail with a [`CatalogError`]
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result alias for operations against the persistent store
pub type StoreResult<T> = Result<T, StoreError>;
