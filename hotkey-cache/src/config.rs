//! Configuration for the hot-key cache.

/// Tunable parameters for a [`crate::HotKeyCache`].
///
/// This is not configuration *loading* — reading from a file, the
/// environment, or a CLI flag remains the surrounding engine's job and is
/// explicitly out of scope (spec.md §1). It is just the in-process knobs
/// the cache itself exposes, the same way the teacher's `StorageConfig`
/// exposes engine-level tunables as a plain struct with a `Default` impl.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hint for the direct index's initial hash map capacity.
    ///
    /// Sizing this to the expected hot-key working set avoids rehashing
    /// storms during the initial promotion burst. spec.md §4.3 notes
    /// rehashing as a known throughput-spike source but sets no latency
    /// bound on it; this knob just lets a host reduce how often it fires.
    pub direct_index_capacity_hint: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            direct_index_capacity_hint: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_a_nonzero_capacity_hint() {
        assert!(CacheConfig::default().direct_index_capacity_hint > 0);
    }
}
