//! The ordered index (C2): a concurrent skip list keyed by user-key.
//!
//! This is the teacher's memtable skip list generalized to the cache's
//! contract: single-writer inserts (no CAS retry loop needed — the writer
//! is externally serialized, per spec.md §5), lock-free reads via
//! acquire-load traversal, and a value slot that is itself mutable after
//! publication rather than an append-only log of versions.
//!
//! # Publication protocol
//!
//! A new node is linked bottom-up: forward slots are written with relaxed
//! ordering while the node is still unreachable, then each predecessor's
//! forward pointer is updated with release ordering, level by level. A
//! reader that follows a forward pointer with an acquire load therefore
//! also observes the node's fully initialized key, value, and lower-level
//! forward slots.

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use hotkey_core::Tag;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

/// Maximum height of the skip list.
///
/// Twelve levels keep the top-level chain short up to roughly 16M entries,
/// far beyond any realistic hot-key working set (spec.md §4.2).
const MAX_HEIGHT: usize = 12;

/// Branching factor for the geometric height distribution: each level has
/// a 1-in-4 chance of extending to the next.
const BRANCHING_FACTOR: u32 = 4;

struct Node {
    /// Immutable once the node is constructed; never mutated after
    /// publication.
    key: Box<[u8]>,
    /// `null` means the entry is a tombstone (`Tag::entry_type() ==
    /// EntryType::Deletion`). Mutated in place by replacing the pointer —
    /// see `NodeHandle::replace_value`.
    value: Atomic<Vec<u8>>,
    /// Packed `(sequence << 8) | type`, patched in place on every update.
    tag: AtomicU64,
    /// One forward pointer per level this node participates in.
    next: Box<[Atomic<Node>]>,
}

impl Node {
    fn new(key: Box<[u8]>, value: Option<Vec<u8>>, tag: Tag, height: usize) -> Owned<Node> {
        let mut next = Vec::with_capacity(height);
        for _ in 0..height {
            next.push(Atomic::null());
        }
        let value = match value {
            Some(v) => Atomic::new(v),
            None => Atomic::null(),
        };
        Owned::new(Node {
            key,
            value,
            tag: AtomicU64::new(tag.to_raw()),
            next: next.into_boxed_slice(),
        })
    }
}

/// A stable, non-owning handle to a node linked in the ordered index.
///
/// `DirectIndex` stores these so updates can reach a node in O(1) instead
/// of re-searching the ordered index (spec.md §2, §4.3). The handle does
/// not own the node: the ordered index is the single root of ownership,
/// and per I5 (node permanence) a linked node is never unlinked or freed
/// before the whole cache is torn down, so the raw pointer stays valid for
/// as long as any `NodeHandle` referencing it could plausibly be used.
#[derive(Clone, Copy)]
pub struct NodeHandle(*const Node);

// Safety: the pointee is only ever mutated through atomics (`value`,
// `tag`) and is never freed while any `HotKeyCache` holding this handle is
// still alive (I5).
unsafe impl Send for NodeHandle {}
unsafe impl Sync for NodeHandle {}

impl NodeHandle {
    fn node(&self) -> &Node {
        unsafe { &*self.0 }
    }

    /// The user-key this handle resolves to.
    pub fn key(&self) -> &[u8] {
        &self.node().key
    }

    /// The current tag.
    pub fn tag(&self) -> Tag {
        Tag::from_raw(self.node().tag.load(AtomicOrdering::Acquire))
    }

    /// The current value, or `None` for a tombstone.
    pub fn value(&self, guard: &Guard) -> Option<Vec<u8>> {
        let shared = self.node().value.load(AtomicOrdering::Acquire, guard);
        if shared.is_null() {
            None
        } else {
            Some(unsafe { shared.deref() }.clone())
        }
    }

    /// Patches the tag in place. The tag is a single `u64`, so this is
    /// inherently non-tearing regardless of reader timing.
    pub(crate) fn set_tag(&self, tag: Tag) {
        self.node().tag.store(tag.to_raw(), AtomicOrdering::Release);
    }

    /// Publishes a new value (or `None` for a tombstone), retiring the
    /// previous buffer through the epoch guard rather than freeing it
    /// immediately — a concurrent reader may still hold a reference to it.
    /// Returns the length of the value that was replaced, for the
    /// facade's byte accounting.
    pub(crate) fn replace_value(&self, guard: &Guard, new: Option<Vec<u8>>) -> usize {
        let new_shared = match new {
            Some(v) => Owned::new(v).into_shared(guard),
            None => Shared::null(),
        };
        let old = self
            .node()
            .value
            .swap(new_shared, AtomicOrdering::AcqRel, guard);
        let old_len = if old.is_null() {
            0
        } else {
            unsafe { old.deref() }.len()
        };
        if !old.is_null() {
            unsafe {
                guard.defer_destroy(old);
            }
        }
        old_len
    }
}

/// A concurrent skip list ordered by user-key, one writer at a time and
/// any number of lock-free concurrent readers.
pub struct OrderedIndex {
    /// The sentinel's own forward pointers. Using a bare array instead of
    /// a real `Node` with an empty key avoids a head that could collide
    /// with a genuine empty-byte user key; the head is `-∞` by
    /// construction, not by a comparison special case.
    head: Box<[Atomic<Node>]>,
    max_height: AtomicUsize,
    len: AtomicUsize,
    rng: Mutex<rand::rngs::StdRng>,
}

impl OrderedIndex {
    /// Creates an empty ordered index.
    pub fn new() -> Self {
        let mut head = Vec::with_capacity(MAX_HEIGHT);
        for _ in 0..MAX_HEIGHT {
            head.push(Atomic::null());
        }
        Self {
            head: head.into_boxed_slice(),
            max_height: AtomicUsize::new(1),
            len: AtomicUsize::new(0),
            rng: Mutex::new(rand::rngs::StdRng::from_entropy()),
        }
    }

    /// Number of nodes currently linked.
    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Relaxed)
    }

    /// `true` if the index has no linked nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn random_height(&self) -> usize {
        let mut height = 1;
        let mut rng = self.rng.lock();
        while height < MAX_HEIGHT && rng.gen_ratio(1, BRANCHING_FACTOR) {
            height += 1;
        }
        height
    }

    /// The node `pred` points to at `level`, where `pred` being null means
    /// "the sentinel head."
    fn forward_at<'g>(
        &self,
        pred: Shared<'g, Node>,
        level: usize,
        guard: &'g Guard,
    ) -> Shared<'g, Node> {
        if pred.is_null() {
            self.head[level].load(AtomicOrdering::Acquire, guard)
        } else {
            unsafe { pred.deref() }.next[level].load(AtomicOrdering::Acquire, guard)
        }
    }

    fn store_forward<'g>(
        &self,
        pred: Shared<'g, Node>,
        level: usize,
        new: Shared<'g, Node>,
        order: AtomicOrdering,
    ) {
        if pred.is_null() {
            self.head[level].store(new, order);
        } else {
            unsafe { pred.deref() }.next[level].store(new, order);
        }
    }

    /// Top-down descent: returns the first node whose key is `>= key`
    /// (null if none), optionally filling in the predecessor observed at
    /// each level for use by `insert`.
    fn find_greater_or_equal<'g>(
        &self,
        key: &[u8],
        mut preds: Option<&mut [Shared<'g, Node>]>,
        guard: &'g Guard,
    ) -> Shared<'g, Node> {
        let mut pred = Shared::null();
        let mut curr = Shared::null();
        let top = self.max_height.load(AtomicOrdering::Acquire);

        for level in (0..top).rev() {
            curr = self.forward_at(pred, level, guard);
            while !curr.is_null() && unsafe { curr.deref() }.key.as_ref() < key {
                pred = curr;
                curr = self.forward_at(pred, level, guard);
            }
            if let Some(p) = preds.as_deref_mut() {
                if level < p.len() {
                    p[level] = pred;
                }
            }
        }
        curr
    }

    /// Returns the last node whose key is strictly less than `key`, or
    /// null if none (the sentinel).
    fn find_less_than<'g>(&self, key: &[u8], guard: &'g Guard) -> Shared<'g, Node> {
        let mut pred = Shared::null();
        let top = self.max_height.load(AtomicOrdering::Acquire);

        for level in (0..top).rev() {
            let mut curr = self.forward_at(pred, level, guard);
            while !curr.is_null() && unsafe { curr.deref() }.key.as_ref() < key {
                pred = curr;
                curr = self.forward_at(pred, level, guard);
            }
        }
        pred
    }

    /// Returns the last node in the list, or null if the list is empty.
    fn find_last<'g>(&self, guard: &'g Guard) -> Shared<'g, Node> {
        let mut pred = Shared::null();
        let top = self.max_height.load(AtomicOrdering::Acquire);

        for level in (0..top).rev() {
            loop {
                let curr = self.forward_at(pred, level, guard);
                if curr.is_null() {
                    break;
                }
                pred = curr;
            }
        }
        pred
    }

    /// Inserts `key` with the given value and tag if it is not already
    /// present. Returns `None` on a duplicate, in which case the caller
    /// (the facade) is responsible for releasing whatever buffers it
    /// already allocated.
    ///
    /// Requires external write serialization — exactly one thread may
    /// call `insert` at a time, so unlike a fully concurrent skip list
    /// this does not retry insertion under CAS contention.
    pub fn insert(
        &self,
        key: &[u8],
        value: Option<Vec<u8>>,
        tag: Tag,
        guard: &Guard,
    ) -> Option<NodeHandle> {
        let mut preds = vec![Shared::null(); MAX_HEIGHT];
        let existing = self.find_greater_or_equal(key, Some(&mut preds), guard);
        if !existing.is_null() && unsafe { existing.deref() }.key.as_ref() == key {
            return None;
        }

        let height = self.random_height();
        let new_node = Node::new(key.to_vec().into_boxed_slice(), value, tag, height);

        for level in 0..height {
            let succ = self.forward_at(preds[level], level, guard);
            new_node.next[level].store(succ, AtomicOrdering::Relaxed);
        }

        let new_shared = new_node.into_shared(guard);

        let mut current_height = self.max_height.load(AtomicOrdering::Relaxed);
        while height > current_height {
            match self.max_height.compare_exchange_weak(
                current_height,
                height,
                AtomicOrdering::Relaxed,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_height = actual,
            }
        }

        for level in 0..height {
            self.store_forward(preds[level], level, new_shared, AtomicOrdering::Release);
        }

        self.len.fetch_add(1, AtomicOrdering::Relaxed);
        Some(NodeHandle(new_shared.as_raw()))
    }

    /// Lock-free membership check.
    pub fn contains(&self, key: &[u8]) -> bool {
        let guard = &epoch::pin();
        let node = self.find_greater_or_equal(key, None, guard);
        !node.is_null() && unsafe { node.deref() }.key.as_ref() == key
    }

    /// An iterator positioned before the first entry.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            current: std::ptr::null(),
        }
    }
}

impl Default for OrderedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OrderedIndex {
    fn drop(&mut self) {
        let guard = &epoch::pin();
        let mut curr = self.head[0].load(AtomicOrdering::Acquire, guard);
        while !curr.is_null() {
            let node_ref = unsafe { curr.deref() };
            let next = node_ref.next[0].load(AtomicOrdering::Acquire, guard);
            let value = node_ref.value.load(AtomicOrdering::Acquire, guard);
            if !value.is_null() {
                unsafe {
                    guard.defer_destroy(value);
                }
            }
            unsafe {
                guard.defer_destroy(curr);
            }
            curr = next;
        }
    }
}

/// Ordered traversal over the level-0 chain of an [`OrderedIndex`].
///
/// Pins a fresh epoch guard for each positioning call rather than holding
/// one for the iterator's whole lifetime — node structure itself never
/// needs protecting (I5 guarantees nodes outlive the cache), only a
/// node's current value buffer does, and only for the instant it is read.
pub struct Iter<'a> {
    list: &'a OrderedIndex,
    current: *const Node,
}

impl<'a> Iter<'a> {
    /// `true` if the iterator is positioned on an entry.
    pub fn valid(&self) -> bool {
        !self.current.is_null()
    }

    /// The key at the current position.
    pub fn key(&self) -> Option<&[u8]> {
        if self.current.is_null() {
            None
        } else {
            Some(unsafe { &(*self.current).key })
        }
    }

    /// The tag at the current position.
    pub fn tag(&self) -> Option<Tag> {
        if self.current.is_null() {
            None
        } else {
            Some(Tag::from_raw(unsafe {
                (*self.current).tag.load(AtomicOrdering::Acquire)
            }))
        }
    }

    /// The value at the current position, or `None` for a tombstone.
    pub fn value(&self) -> Option<Vec<u8>> {
        if self.current.is_null() {
            return None;
        }
        let guard = epoch::pin();
        let shared = unsafe { &(*self.current).value }.load(AtomicOrdering::Acquire, &guard);
        if shared.is_null() {
            None
        } else {
            Some(unsafe { shared.deref() }.clone())
        }
    }

    /// Positions the iterator on the first key `>= target`.
    pub fn seek(&mut self, target: &[u8]) {
        let guard = epoch::pin();
        let node = self.list.find_greater_or_equal(target, None, &guard);
        self.current = node.as_raw();
    }

    /// Positions the iterator on the first key in the index.
    pub fn seek_to_first(&mut self) {
        let guard = epoch::pin();
        let node = self.list.forward_at(Shared::null(), 0, &guard);
        self.current = node.as_raw();
    }

    /// Positions the iterator on the last key in the index.
    pub fn seek_to_last(&mut self) {
        let guard = epoch::pin();
        let node = self.list.find_last(&guard);
        self.current = node.as_raw();
    }

    /// Advances to the next entry. No-op if already invalid.
    pub fn next(&mut self) {
        if self.current.is_null() {
            return;
        }
        let guard = epoch::pin();
        let node = unsafe { (*self.current).next[0].load(AtomicOrdering::Acquire, &guard) };
        self.current = node.as_raw();
    }

    /// Moves to the previous entry.
    ///
    /// There are no back-pointers, so this rescans from the head via
    /// `find_less_than` (spec.md §4.2) — O(log n) rather than O(1), the
    /// documented cost of this skip list's iterator design.
    pub fn prev(&mut self) {
        if self.current.is_null() {
            self.seek_to_last();
            return;
        }
        let key = unsafe { (*self.current).key.clone() };
        let guard = epoch::pin();
        let node = self.list.find_less_than(&key, &guard);
        self.current = node.as_raw();
    }
}
