//! The entry arena (C1): ownership and mutation rules for node buffers.
//!
//! Plain dynamic allocation is adequate here (spec.md §4.1) — there is no
//! pooling requirement. What this module centralizes is the *contract*:
//! `alloc_key` is write-once and never revisited; `alloc_value` hands back
//! a plain owned buffer that the ordered index may later patch in place or
//! replace wholesale (see `skiplist::NodeHandle::replace_value`); the tag
//! is fixed-width and always patched in place, so it needs no allocation
//! helper at all — it lives directly in an `AtomicU64`.
//!
//! Both allocators reserve with `try_reserve_exact` rather than the
//! infallible `Vec`/`Box` copy, so an allocator-reported OOM surfaces as
//! [`hotkey_core::Error::Allocation`] instead of aborting the process —
//! the recoverable half of spec.md §7's failure taxonomy ("allocation
//! failure is fatal to the single operation", not to the cache).
//!
//! These functions are only ever called from the single writer thread.

use hotkey_core::{Error, Result};

/// Copies `bytes` into an owned, immutable key buffer.
///
/// `key_bytes` is written once at node creation and never mutated again.
pub(crate) fn alloc_key(bytes: &[u8]) -> Result<Box<[u8]>> {
    Ok(try_copy(bytes)?.into_boxed_slice())
}

/// Copies `bytes` into an owned value buffer.
pub(crate) fn alloc_value(bytes: &[u8]) -> Result<Vec<u8>> {
    try_copy(bytes)
}

fn try_copy(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|e| Error::Allocation(e.to_string()))?;
    buf.extend_from_slice(bytes);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_key_copies_independently() {
        let mut source = b"hello".to_vec();
        let key = alloc_key(&source).unwrap();
        source[0] = b'H';
        assert_eq!(&*key, b"hello");
    }

    #[test]
    fn alloc_value_copies_independently() {
        let mut source = b"world".to_vec();
        let value = alloc_value(&source).unwrap();
        source.clear();
        assert_eq!(value, b"world");
    }
}
