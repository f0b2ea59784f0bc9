//! Bounded LRU Cache
//!
//! Hash index plus recency list under one lock, with low/high watermark
//! eviction so a full cache sheds entries in batches.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::cache::{Cache, CacheStats, ExactKeys, KeyComparer, RecencyList};
use crate::error::{Result, StoreError};

/// Observer invoked once per evicted key/value pair.
pub type PurgedHandler<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

// == Cache State ==
/// Everything guarded by the cache lock.
struct LruState<K, V> {
    /// Canonical key -> list slot
    index: HashMap<K, usize>,
    list: RecencyList<K, V>,
    high_watermark: usize,
    low_watermark: usize,
    stats: CacheStats,
}

impl<K: Eq + Hash, V> LruState<K, V> {
    fn should_cache(&self) -> bool {
        self.high_watermark > 0
    }

    /// Evicts LRU entries until at most `target` remain.
    fn shrink_to(&mut self, target: usize, comparer: &dyn KeyComparer<K>) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        while self.list.len() > target {
            let Some((key, value)) = self.list.evict_oldest() else {
                break;
            };
            self.index.remove(&comparer.canonicalize(&key));
            evicted.push((key, value));
        }

        if !evicted.is_empty() {
            self.stats.record_evictions(evicted.len());
            debug!(
                evicted = evicted.len(),
                remaining = self.list.len(),
                "Cache shrank to watermark"
            );
        }
        self.stats.set_total_entries(self.list.len());
        evicted
    }

    fn clear(&mut self) {
        self.index.clear();
        self.list.clear();
        self.stats.set_total_entries(0);
    }
}

// == LRU Cache ==
/// Thread-safe bounded cache with most-recently-used ordering.
///
/// The cache never holds more than the high watermark. Inserting a new key
/// into a full cache first evicts least recently used entries so that, with
/// the new entry, exactly `low_watermark` entries remain. A high watermark of
/// zero disables caching: lookups miss and insertions are dropped.
pub struct LruCache<K, V> {
    state: Mutex<LruState<K, V>>,
    comparer: Box<dyn KeyComparer<K>>,
    purged: RwLock<Vec<PurgedHandler<K, V>>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a cache whose low and high watermarks both equal `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        Self::build(max_entries, max_entries)
    }

    /// Creates a cache with distinct watermarks.
    ///
    /// Fails if `low_watermark > high_watermark`.
    pub fn with_watermarks(low_watermark: usize, high_watermark: usize) -> Result<Self> {
        validate_watermarks(low_watermark, high_watermark)?;
        Ok(Self::build(low_watermark, high_watermark))
    }

    /// Returns a cache for `max_entries`, or None when caching is disabled.
    pub fn create(max_entries: usize) -> Option<Self> {
        (max_entries > 0).then(|| Self::new(max_entries))
    }

    fn build(low_watermark: usize, high_watermark: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                index: HashMap::new(),
                list: RecencyList::new(),
                high_watermark,
                low_watermark,
                stats: CacheStats::new(),
            }),
            comparer: Box::new(ExactKeys),
            purged: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the key comparison strategy. Existing entries are dropped.
    pub fn with_comparer(mut self, comparer: impl KeyComparer<K> + 'static) -> Self {
        self.state.get_mut().clear();
        self.comparer = Box::new(comparer);
        self
    }

    // == Purge Notification ==
    /// Registers an observer for evicted entries.
    ///
    /// Observers run on the thread that triggered the eviction, after the
    /// cache lock has been released.
    pub fn on_purged<F>(&self, handler: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.purged.write().push(Arc::new(handler));
    }

    fn notify_purged(&self, evicted: Vec<(K, V)>) {
        if evicted.is_empty() {
            return;
        }
        let handlers: Vec<PurgedHandler<K, V>> = self.purged.read().clone();
        for (key, value) in &evicted {
            for handler in &handlers {
                handler(key, value);
            }
        }
    }

    // == Watermarks ==
    pub fn high_watermark(&self) -> usize {
        self.state.lock().high_watermark
    }

    pub fn low_watermark(&self) -> usize {
        self.state.lock().low_watermark
    }

    /// Sets both watermarks and trims to the new low watermark.
    pub fn set_watermarks(&self, low_watermark: usize, high_watermark: usize) -> Result<()> {
        validate_watermarks(low_watermark, high_watermark)?;
        {
            let mut state = self.state.lock();
            state.low_watermark = low_watermark;
            state.high_watermark = high_watermark;
        }
        self.trim();
        Ok(())
    }

    // == Stats ==
    /// Returns a snapshot of the hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.list.len());
        stats
    }

    /// Returns true if `key` is cached. Counts as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.try_get_with(key, |_| Some(())).is_some()
    }

    // == Lookup ==
    /// Looks up `key` and, if indexed, promotes it and applies `read`.
    ///
    /// An indexed key counts as a hit even when `read` declines the value.
    pub(crate) fn try_get_with<R>(&self, key: &K, read: impl FnOnce(&mut V) -> Option<R>) -> Option<R> {
        let mut state = self.state.lock();
        if !state.should_cache() {
            return None;
        }

        let canonical = self.comparer.canonicalize(key);
        let Some(&slot) = state.index.get(&canonical) else {
            state.stats.record_miss();
            return None;
        };

        state.stats.record_hit();
        state.list.touch(slot);
        state.list.entry_mut(slot).and_then(|entry| read(&mut entry.value))
    }

    /// Visits every cached value without touching recency or statistics.
    pub(crate) fn for_each_value_mut(&self, mut visit: impl FnMut(&mut V)) {
        let mut state = self.state.lock();
        for value in state.list.values_mut() {
            visit(value);
        }
    }
}

fn validate_watermarks(low_watermark: usize, high_watermark: usize) -> Result<()> {
    if low_watermark > high_watermark {
        return Err(StoreError::InvalidConfig(format!(
            "low watermark {} exceeds high watermark {}",
            low_watermark, high_watermark
        )));
    }
    Ok(())
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn len(&self) -> usize {
        self.state.lock().list.len()
    }

    fn max_count(&self) -> usize {
        self.high_watermark()
    }

    fn set_max_count(&self, max_count: usize) {
        {
            let mut state = self.state.lock();
            state.high_watermark = max_count;
            state.low_watermark = max_count;
        }
        self.trim();
    }

    fn try_get(&self, key: &K) -> Option<V> {
        self.try_get_with(key, |value| Some(value.clone()))
    }

    fn put(&self, key: K, value: V) {
        let evicted = {
            let mut state = self.state.lock();
            if !state.should_cache() {
                return;
            }

            let canonical = self.comparer.canonicalize(&key);
            if let Some(&slot) = state.index.get(&canonical) {
                if let Some(entry) = state.list.entry_mut(slot) {
                    entry.key = key;
                    entry.value = value;
                }
                state.list.touch(slot);
                return;
            }

            // Full: shed down to one below the low watermark so the new
            // entry lands the cache exactly on it.
            let evicted = if state.list.len() >= state.high_watermark {
                let target = state.low_watermark.saturating_sub(1);
                state.shrink_to(target, self.comparer.as_ref())
            } else {
                Vec::new()
            };

            let slot = state.list.push_front(key, value);
            state.index.insert(canonical, slot);
            let len = state.list.len();
            state.stats.set_total_entries(len);
            evicted
        };

        self.notify_purged(evicted);
    }

    fn remove(&self, key: &K) {
        let mut state = self.state.lock();
        let canonical = self.comparer.canonicalize(key);
        if let Some(slot) = state.index.remove(&canonical) {
            state.list.remove(slot);
            let len = state.list.len();
            state.stats.set_total_entries(len);
        }
    }

    fn trim(&self) {
        let evicted = {
            let mut state = self.state.lock();
            if !state.should_cache() {
                state.clear();
                return;
            }
            let target = state.low_watermark;
            state.shrink_to(target, self.comparer.as_ref())
        };

        self.notify_purged(evicted);
    }

    fn clear(&self) {
        self.state.lock().clear();
    }

    fn keys(&self) -> Vec<K> {
        self.state.lock().list.keys().cloned().collect()
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruCache")
            .field("len", &state.list.len())
            .field("low_watermark", &state.low_watermark)
            .field("high_watermark", &state.high_watermark)
            .field("stats", &state.stats)
            .finish()
    }
}
