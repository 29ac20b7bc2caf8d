//! Core types and error handling shared by the hot-key cache.
//!
//! This crate contains the fundamentals a hot-key cache needs independent
//! of how the ordered and direct indices are implemented:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - The [`Tag`] / [`EntryType`] wire encoding shared with the surrounding
//!   LSM host
//! - Basic aliases like [`UserKey`] and [`Value`]
//!
//! # Example
//!
//! ```
//! use hotkey_core::{EntryType, Tag, UserKey};
//!
//! let key: UserKey = b"user:123".to_vec();
//! let tag = Tag::new(42, EntryType::Value);
//! assert_eq!(tag.sequence(), 42);
//! ```

pub mod error;
pub mod tag;

pub use error::{Error, Result};
pub use tag::{EntryType, Tag};

/// A user-visible key, represented as a byte vector.
pub type UserKey = Vec<u8>;

/// A value in the store, represented as a byte vector.
pub type Value = Vec<u8>;

/// The monotonic sequence number the LSM host assigns to every write.
///
/// Only the low 56 bits are meaningful; see [`Tag`].
pub type SequenceNumber = u64;
