//! Cache Entry Module
//!
//! Defines a single slot of the recency list: the key/value pair plus its links.

// == Cache Entry ==
/// A key/value pair linked into the recency list.
///
/// Links are slot indices into the owning [`RecencyList`](super::RecencyList),
/// so promoting or unlinking an entry never moves the pair itself.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key as it was last written
    pub key: K,
    /// The stored value
    pub value: V,
    /// Slot of the neighbour closer to the MRU end
    pub(crate) prev: Option<usize>,
    /// Slot of the neighbour closer to the LRU end
    pub(crate) next: Option<usize>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates an unlinked entry.
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            prev: None,
            next: None,
        }
    }

    // == Into Pair ==
    /// Consumes the entry, returning the key/value pair.
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}
