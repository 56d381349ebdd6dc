//! Error type definitions for the catalog store
//!
//! This module defines all error types used throughout the crate, providing
//! a hierarchical error system that makes debugging and error handling more
//! straightforward.

use thiserror::Error;

/// Top-level catalog error type
///
/// This enum represents all possible errors that can surface from catalog
/// operations. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Image compression pipeline errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The projected write would exceed the logical quota
    #[error("Quota exceeded: needed {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    /// Even the degraded (image-free) write failed
    #[error("Storage exhausted: {message}")]
    StorageExhausted { message: String },

    /// Operation referenced a nonexistent item
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Malformed caller input (empty upload, bad permutation, full list)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// Image compression pipeline errors
#[derive(Error, Debug)]
pub enum CodecError {
    /// Zero-byte upload
    #[error("Empty image input")]
    EmptyInput,

    /// Input bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Re-encoding the raster failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
}

/// Persistent store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The storage medium refused the write at its own hard ceiling
    #[error("Storage quota exceeded: write of {attempted} bytes over {limit} byte limit")]
    QuotaExceeded { attempted: u64, limit: u64 },

    /// Underlying filesystem failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience methods for creating common error types
impl CatalogError {
    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an invalid input error with a custom message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a quota exceeded error
    pub fn quota_exceeded(needed: u64, available: u64) -> Self {
        Self::QuotaExceeded { needed, available }
    }

    /// Create a storage exhausted error
    pub fn storage_exhausted<S: Into<String>>(message: S) -> Self {
        Self::StorageExhausted {
            message: message.into(),
        }
    }

    /// Whether this error indicates the mutation was rejected without any
    /// state change
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::StorageExhausted { .. }
        )
    }
}

impl CodecError {
    /// Create an encode error
    pub fn encode<S: Into<String>>(message: S) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}
