//! The direct index (C3): user-key → node handle, for O(1) update hits.

use crate::skiplist::NodeHandle;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Maps a user-key to the [`NodeHandle`] that owns it.
///
/// spec.md §4.3 is explicit that this does not need concurrent-map
/// semantics today: both `insert_from_compaction` and `update_if_exist`
/// are called from the single externally-serialized writer, so a
/// `parking_lot::Mutex<HashMap<..>>` is correct. If a future design calls
/// `update_if_exist` concurrently with compaction, this is the component
/// to swap for a concurrent hash map — not before.
pub(crate) struct DirectIndex {
    map: Mutex<HashMap<Box<[u8]>, NodeHandle>>,
}

impl DirectIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Records `key → handle`. I1/I4 guarantee the facade never calls
    /// this twice for the same key, so there is nothing to replace.
    pub fn insert(&self, key: &[u8], handle: NodeHandle) {
        self.map.lock().insert(key.to_vec().into_boxed_slice(), handle);
    }

    /// Looks up the node handle for `key`, if cached.
    pub fn get(&self, key: &[u8]) -> Option<NodeHandle> {
        self.map.lock().get(key).copied()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }
}
