//! Error types for the hot-key cache
//!
//! This module defines the error types used throughout the cache. Most
//! cache operations do not fail in the ordinary sense — a duplicate
//! promotion or a miss on update are outcomes, not errors — so this
//! taxonomy is intentionally small.

use thiserror::Error;

/// The error type for hot-key cache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Allocating a node or buffer failed.
    ///
    /// The cache guarantees that when this is returned, neither index was
    /// mutated and no counter was incremented.
    #[error("allocation failed: {0}")]
    Allocation(String),
}

/// A specialized `Result` type for hot-key cache operations.
pub type Result<T> = std::result::Result<T, Error>;
