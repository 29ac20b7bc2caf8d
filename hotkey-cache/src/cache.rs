//! The Hot-Key Cache facade (C4): coordinates the entry arena, the
//! ordered index, and the direct index under the write-path contract from
//! spec.md §4.4, and tracks the accounting counters behind `report`.

use crate::arena;
use crate::config::CacheConfig;
use crate::direct_index::DirectIndex;
use crate::skiplist::{Iter, OrderedIndex};
use crossbeam::epoch;
use hotkey_core::{EntryType, Result, Tag};
use std::sync::atomic::{AtomicU64, Ordering};

/// Absorbs updates to compaction-selected hot keys in place, so that LSM
/// compaction stops rewriting their obsolete versions.
///
/// # Concurrency
///
/// Exactly one writer thread may call [`insert_from_compaction`] or
/// [`update_if_exist`] at a time — the surrounding engine must serialize
/// them, typically with the same mutex that guards memtable switching
/// (spec.md §5). Any number of reader threads may call [`contains`] or
/// iterate concurrently with that writer.
///
/// [`insert_from_compaction`]: HotKeyCache::insert_from_compaction
/// [`update_if_exist`]: HotKeyCache::update_if_exist
/// [`contains`]: HotKeyCache::contains
pub struct HotKeyCache {
    ordered: OrderedIndex,
    direct: DirectIndex,
    bytes: AtomicU64,
    puts: AtomicU64,
    hits: AtomicU64,
}

impl HotKeyCache {
    /// Creates an empty cache with default tunables.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates an empty cache with the given tunables.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            ordered: OrderedIndex::new(),
            direct: DirectIndex::with_capacity(config.direct_index_capacity_hint),
            bytes: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Promotes a compaction-selected key into the cache.
    ///
    /// `internal_key` is `user_key ∥ tag`, an 8-byte little-endian tag
    /// suffix appended to the user-key (spec.md §6). `value` is the value
    /// bytes for that entry. If the user-key is already cached this is a
    /// silent no-op: the compactor remains free to re-pick it later.
    ///
    /// Returns [`hotkey_core::Error::Allocation`] if the key or value
    /// buffer could not be allocated; per spec.md §7 this is fatal only to
    /// the single operation, and neither index nor counter is touched.
    ///
    /// # Panics
    ///
    /// Panics if `internal_key` is shorter than 8 bytes. The host must
    /// never call this with a bare user-key; that contract violation is a
    /// programmer error, not a recoverable condition (spec.md §7).
    pub fn insert_from_compaction(&self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        assert!(
            internal_key.len() >= 8,
            "internal_key must carry an 8-byte tag suffix, got {} bytes",
            internal_key.len()
        );
        let split = internal_key.len() - 8;
        let user_key = &internal_key[..split];
        let tag_bytes: [u8; 8] = internal_key[split..]
            .try_into()
            .expect("exactly 8 bytes by construction");
        let tag = Tag::from_le_bytes(tag_bytes);

        let stored_value = match tag.entry_type() {
            EntryType::Deletion => None,
            _ => Some(arena::alloc_value(value)?),
        };
        let key_buf = arena::alloc_key(user_key)?;

        let guard = epoch::pin();
        match self.ordered.insert(&key_buf, stored_value, tag, &guard) {
            Some(handle) => {
                self.direct.insert(&key_buf, handle);
                self.bytes.fetch_add(
                    (key_buf.len() + value.len() + 8) as u64,
                    Ordering::Relaxed,
                );
                log::debug!(
                    "promoted a hot key ({} bytes total) into the cache",
                    key_buf.len() + value.len() + 8
                );
            }
            None => {
                // Duplicate promotion: the allocated key/value buffers are
                // simply dropped here. Nothing was linked, so there is
                // nothing else to release.
                log::warn!("duplicate promotion for an already-cached key, skipping");
            }
        }
        Ok(())
    }

    /// Applies a user write to a cached entry, if one exists.
    ///
    /// Returns `true` if `user_key` was already cached (a hit) and its
    /// tag and value were updated in place. Returns `false` on a miss —
    /// the cache is left unchanged and the write must go through the
    /// ordinary LSM write path instead.
    ///
    /// Returns [`hotkey_core::Error::Allocation`] if the new value buffer
    /// could not be allocated; per spec.md §7 the node, the direct index,
    /// and every counter are left untouched when that happens.
    pub fn update_if_exist(
        &self,
        sequence: u64,
        entry_type: EntryType,
        user_key: &[u8],
        value: &[u8],
    ) -> Result<bool> {
        let handle = match self.direct.get(user_key) {
            Some(handle) => handle,
            None => {
                self.puts.fetch_add(1, Ordering::Relaxed);
                log::debug!("update missed an uncached key");
                return Ok(false);
            }
        };

        // Always publish a fresh value buffer rather than memcpy-patching
        // the existing one in place, even when lengths match. This is the
        // conservative alternative spec.md §5 explicitly permits, giving
        // strict snapshot reads with no torn-read contract to document.
        // Allocate before touching any counter or the node itself, so an
        // allocation failure here leaves the cache exactly as it was.
        let new_value = match entry_type {
            EntryType::Deletion => None,
            _ => Some(arena::alloc_value(value)?),
        };
        let new_len = new_value.as_ref().map_or(0, Vec::len);

        self.puts.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);

        // The bytes counter sums `|k| + |v| + 8` over *live* entries only
        // (P6), so a transition into or out of `Deletion` must add or
        // remove the key's own `|k| + 8` overhead, not just the value's
        // length delta — track each side's full live contribution rather
        // than diffing value length alone.
        let old_tag = handle.tag();
        handle.set_tag(Tag::new(sequence, entry_type));

        let guard = epoch::pin();
        let old_len = handle.replace_value(&guard, new_value);

        let key_len = handle.key().len();
        let old_contribution = live_contribution(old_tag.entry_type(), key_len, old_len);
        let new_contribution = live_contribution(entry_type, key_len, new_len);

        if new_contribution >= old_contribution {
            self.bytes.fetch_add(
                (new_contribution - old_contribution) as u64,
                Ordering::Relaxed,
            );
        } else {
            self.bytes.fetch_sub(
                (old_contribution - new_contribution) as u64,
                Ordering::Relaxed,
            );
        }

        Ok(true)
    }

    /// Returns whether `user_key` is currently cached. Lock-free, correct
    /// under a concurrent writer (spec.md §4.2).
    pub fn contains(&self, user_key: &[u8]) -> bool {
        self.ordered.contains(user_key)
    }

    /// An iterator over the ordered index, in ascending user-key order.
    pub fn iter(&self) -> Iter<'_> {
        self.ordered.iter()
    }

    /// Number of keys currently cached.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Current accounting snapshot.
    pub fn report(&self) -> CacheReport {
        CacheReport {
            bytes: self.bytes.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// Logs total bytes cached (GiB, 3 decimal places) and the hit ratio
    /// (`hits / puts`, `0.0` if there have been no puts yet).
    pub fn print_cache_info(&self) {
        let report = self.report();
        let gib = report.bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        let hit_ratio = if report.puts == 0 {
            0.0
        } else {
            report.hits as f64 / report.puts as f64
        };
        log::info!(
            "hot-key cache: {gib:.3} GiB cached, hit ratio {hit_ratio:.4} ({} hits / {} puts)",
            report.hits,
            report.puts
        );
    }
}

impl Default for HotKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A node's contribution to the bytes counter: `|k| + |v| + 8` while live,
/// `0` once its type is `Deletion` (P6 sums over live entries only).
fn live_contribution(entry_type: EntryType, key_len: usize, value_len: usize) -> usize {
    match entry_type {
        EntryType::Deletion => 0,
        _ => key_len + value_len + 8,
    }
}

/// Accounting snapshot returned by [`HotKeyCache::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheReport {
    /// Total bytes cached, `Σ (|key| + |value| + 8)` over live entries.
    pub bytes: u64,
    /// Total number of `update_if_exist` calls.
    pub puts: u64,
    /// Number of `update_if_exist` calls that hit a cached key.
    pub hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal_key(user_key: &[u8], sequence: u64, entry_type: EntryType) -> Vec<u8> {
        let mut out = user_key.to_vec();
        out.extend_from_slice(&Tag::new(sequence, entry_type).to_le_bytes());
        out
    }

    #[test]
    fn s1_promote_then_update_same_length() {
        let cache = HotKeyCache::new();
        cache
            .insert_from_compaction(&internal_key(b"apple", 10, EntryType::Value), b"red")
            .unwrap();

        let hit = cache
            .update_if_exist(11, EntryType::Value, b"apple", b"blu")
            .unwrap();
        assert!(hit);

        let handle = cache.direct.get(b"apple").unwrap();
        assert_eq!(handle.tag().sequence(), 11);
        assert_eq!(handle.tag().entry_type(), EntryType::Value);
        let guard = epoch::pin();
        assert_eq!(handle.value(&guard), Some(b"blu".to_vec()));

        let report = cache.report();
        assert_eq!(report.bytes, 5 + 3 + 8);
        assert_eq!(report.puts, 1);
        assert_eq!(report.hits, 1);
    }

    #[test]
    fn s2_promote_then_update_with_grow() {
        let cache = HotKeyCache::new();
        cache
            .insert_from_compaction(&internal_key(b"k", 1, EntryType::Value), b"v")
            .unwrap();

        assert!(cache
            .update_if_exist(2, EntryType::Value, b"k", b"value")
            .unwrap());

        let handle = cache.direct.get(b"k").unwrap();
        let guard = epoch::pin();
        assert_eq!(handle.value(&guard), Some(b"value".to_vec()));
        assert_eq!(handle.tag().sequence(), 2);

        let report = cache.report();
        assert_eq!(report.bytes, 1 + 5 + 8);
    }

    #[test]
    fn s3_delete_then_revive() {
        let cache = HotKeyCache::new();
        cache
            .insert_from_compaction(&internal_key(b"k", 1, EntryType::Value), b"v")
            .unwrap();
        assert_eq!(cache.report().bytes, 1 + 1 + 8);

        assert!(cache
            .update_if_exist(2, EntryType::Deletion, b"k", b"")
            .unwrap());
        let handle = cache.direct.get(b"k").unwrap();
        let guard = epoch::pin();
        assert_eq!(handle.value(&guard), None);
        assert_eq!(handle.tag().entry_type(), EntryType::Deletion);
        // P6 sums over live entries only: a tombstoned key drops its
        // |k| + 8 overhead from the bytes counter entirely, not just its
        // value length.
        assert_eq!(cache.report().bytes, 0);

        assert!(cache
            .update_if_exist(3, EntryType::Value, b"k", b"v2")
            .unwrap());
        let guard = epoch::pin();
        assert_eq!(handle.value(&guard), Some(b"v2".to_vec()));
        assert_eq!(handle.tag().sequence(), 3);
        assert_eq!(handle.tag().entry_type(), EntryType::Value);
        assert_eq!(cache.report().bytes, 1 + 2 + 8);

        assert_eq!(cache.report().hits, 2);
    }

    #[test]
    fn s4_missing_update() {
        let cache = HotKeyCache::new();
        assert!(!cache
            .update_if_exist(5, EntryType::Value, b"ghost", b"x")
            .unwrap());

        let report = cache.report();
        assert_eq!(report.puts, 1);
        assert_eq!(report.hits, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn s5_duplicate_promotion_leaves_first_node() {
        let cache = HotKeyCache::new();
        cache
            .insert_from_compaction(&internal_key(b"k", 1, EntryType::Value), b"a")
            .unwrap();
        cache
            .insert_from_compaction(&internal_key(b"k", 2, EntryType::Value), b"b")
            .unwrap();

        assert_eq!(cache.len(), 1);

        let handle = cache.direct.get(b"k").unwrap();
        assert_eq!(handle.tag().sequence(), 1);
        let guard = epoch::pin();
        assert_eq!(handle.value(&guard), Some(b"a".to_vec()));
    }

    #[test]
    fn s6_ordered_traversal() {
        let cache = HotKeyCache::new();
        cache
            .insert_from_compaction(&internal_key(b"b", 1, EntryType::Value), b"1")
            .unwrap();
        cache
            .insert_from_compaction(&internal_key(b"a", 2, EntryType::Value), b"2")
            .unwrap();
        cache
            .insert_from_compaction(&internal_key(b"c", 3, EntryType::Value), b"3")
            .unwrap();

        let mut it = cache.iter();
        it.seek_to_first();
        let mut order = Vec::new();
        while it.valid() {
            order.push(it.key().unwrap().to_vec());
            it.next();
        }
        assert_eq!(order, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let mut it = cache.iter();
        it.seek(b"b");
        assert_eq!(it.key(), Some(b"b".as_slice()));

        it.prev();
        assert_eq!(it.key(), Some(b"a".as_slice()));

        it.prev();
        assert!(!it.valid());
    }

    #[test]
    fn print_cache_info_does_not_panic_when_empty() {
        let cache = HotKeyCache::new();
        cache.print_cache_info();
    }
}
