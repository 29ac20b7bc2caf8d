//! Hot-key cache for a log-structured merge-tree store.
//!
//! In a skewed (Zipfian/Pareto) write workload a small set of keys
//! dominate update traffic. The standard LSM discipline of append-only
//! writes followed by background compaction wastes work rewriting
//! obsolete versions of those keys. This crate implements the subsystem
//! that sits beside the memtable and absorbs updates to keys compaction
//! has identified as hot, mutating their value **in place** so compaction
//! no longer has to rewrite them and reads can be satisfied from a single
//! location.
//!
//! Two data structures do the work, wired together by a facade:
//!
//! - [`OrderedIndex`](skiplist::OrderedIndex) — a lock-free-read
//!   concurrent skip list keyed by user-key, carrying a mutable value
//!   slot and a mutable tag slot per node.
//! - [`DirectIndex`](direct_index) (private) — a user-key → node handle
//!   map so updates avoid an O(log n) ordered search.
//! - [`HotKeyCache`] — coordinates both under the write-path contract and
//!   the accounting counters the host reads via [`HotKeyCache::report`].
//!
//! # Example
//!
//! ```
//! use hotkey_cache::HotKeyCache;
//! use hotkey_core::{EntryType, Tag};
//!
//! let cache = HotKeyCache::new();
//!
//! let mut internal_key = b"hot-key".to_vec();
//! internal_key.extend_from_slice(&Tag::new(10, EntryType::Value).to_le_bytes());
//! cache.insert_from_compaction(&internal_key, b"initial value")?;
//!
//! assert!(cache.update_if_exist(11, EntryType::Value, b"hot-key", b"updated value")?);
//! assert!(!cache.update_if_exist(12, EntryType::Value, b"never-promoted", b"x")?);
//! # Ok::<(), hotkey_core::Error>(())
//! ```
//!
//! # Scope
//!
//! This crate covers only the cache core: the full LSM engine (WAL,
//! SSTables, compaction scheduling, recovery), the hotness classifier
//! that decides which keys get promoted, and range iteration are the
//! surrounding engine's responsibility.

mod arena;
mod cache;
mod config;
mod direct_index;
pub mod skiplist;

pub use cache::{CacheReport, HotKeyCache};
pub use config::CacheConfig;
