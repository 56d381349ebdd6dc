//! Catalog state management
//!
//! The repository is the single owner of the in-memory catalog and the only
//! writer of the persistent store. Eviction and seed data live alongside it.

pub mod eviction;
pub mod repository;
pub mod seed;

pub use eviction::{EvictionPolicy, EvictionStrategy};
pub use repository::{CatalogRepository, COVER_PHOTOS_KEY, ITEMS_KEY};
