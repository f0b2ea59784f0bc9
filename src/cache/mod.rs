//! Cache Module
//!
//! Bounded in-memory caches with LRU ordering and watermark eviction.

mod bounded;
mod comparer;
mod entry;
mod lru;
mod purgeable;
mod stats;


// Re-export public types
pub use bounded::{LruCache, PurgedHandler};
pub use comparer::{CaseInsensitive, ExactKeys, KeyComparer};
pub use entry::CacheEntry;
pub use lru::RecencyList;
pub use purgeable::{MemoryPressure, PurgeableCache, Reclaimable};
pub use stats::CacheStats;

// == Cache Trait ==
/// Common surface of the bounded and purgeable caches.
///
/// Every call on one instance is serialized by that instance's lock; none of
/// them block on I/O.
pub trait Cache<K, V>: Send + Sync {
    /// Number of indexed entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The high watermark.
    fn max_count(&self) -> usize;

    /// Sets both watermarks to `max_count` and trims immediately.
    fn set_max_count(&self, max_count: usize);

    /// Returns the cached value and marks it most recently used.
    fn try_get(&self, key: &K) -> Option<V>;

    /// Inserts or replaces a value at the most recently used position.
    fn put(&self, key: K, value: V);

    fn remove(&self, key: &K);

    /// Evicts down to the low watermark, or clears a disabled cache.
    fn trim(&self);

    fn clear(&self);

    /// Indexed keys, most recently used first.
    fn keys(&self) -> Vec<K>;
}
