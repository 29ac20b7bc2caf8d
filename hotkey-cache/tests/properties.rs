//! Property-based coverage for the ordered index's universal invariants:
//! ascending order (I2/P1) and unique membership (I1/P2) across arbitrary
//! interleavings of promotions with distinct keys.

use hotkey_cache::HotKeyCache;
use hotkey_core::{EntryType, Tag};
use proptest::collection::{hash_set, vec};
use proptest::prelude::*;

fn internal_key(user_key: &[u8], sequence: u64) -> Vec<u8> {
    let mut out = user_key.to_vec();
    out.extend_from_slice(&Tag::new(sequence, EntryType::Value).to_le_bytes());
    out
}

proptest! {
    #[test]
    fn promoting_distinct_keys_keeps_level_zero_sorted(
        keys in hash_set(vec(any::<u8>(), 1..8), 1..40)
    ) {
        let cache = HotKeyCache::new();
        for (i, key) in keys.iter().enumerate() {
            cache.insert_from_compaction(&internal_key(key, i as u64), b"v").unwrap();
        }

        let mut it = cache.iter();
        it.seek_to_first();
        let mut previous: Option<Vec<u8>> = None;
        let mut count = 0usize;
        while it.valid() {
            let key = it.key().unwrap().to_vec();
            if let Some(prev) = &previous {
                prop_assert!(prev.as_slice() < key.as_slice());
            }
            previous = Some(key);
            count += 1;
            it.next();
        }
        prop_assert_eq!(count, keys.len());
    }

    #[test]
    fn repeated_promotion_of_the_same_key_never_duplicates(
        key in vec(any::<u8>(), 1..8),
        extra_promotions in 0..10u32,
    ) {
        let cache = HotKeyCache::new();
        cache.insert_from_compaction(&internal_key(&key, 0), b"first").unwrap();
        for i in 0..extra_promotions {
            cache.insert_from_compaction(&internal_key(&key, (i + 1) as u64), b"later").unwrap();
        }

        prop_assert_eq!(cache.len(), 1);
        prop_assert!(cache.contains(&key));
    }
}
