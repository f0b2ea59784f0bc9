//! Purgeable Cache
//!
//! An LRU cache whose values can be reclaimed under memory pressure
//! independently of the watermark policy.
//!
//! Each value is stamped with the epoch of a shared [`MemoryPressure`]
//! handle when it is inserted. Signalling pressure reclaims every epoch up
//! to the current one; a reclaimed value reads as a miss. Its memory is
//! released on that read or by the next [`trim`](Cache::trim) sweep, whichever
//! comes first, while its key stays indexed until LRU eviction or an
//! overwrite removes it.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::cache::{Cache, CacheStats, KeyComparer, LruCache};
use crate::error::Result;

// == Memory Pressure ==
struct PressureState {
    epoch: AtomicU64,
    reclaimed_through: AtomicU64,
    signal: Notify,
}

/// Shared reclamation signal. Clones observe the same epochs.
#[derive(Clone)]
pub struct MemoryPressure {
    state: Arc<PressureState>,
}

impl Default for MemoryPressure {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPressure {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PressureState {
                epoch: AtomicU64::new(1),
                reclaimed_through: AtomicU64::new(0),
                signal: Notify::new(),
            }),
        }
    }

    /// Epoch stamped on values inserted now.
    pub fn current_epoch(&self) -> u64 {
        self.state.epoch.load(Ordering::Acquire)
    }

    /// Opens a new epoch without reclaiming anything. Returns the new epoch.
    pub fn advance(&self) -> u64 {
        self.state.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Reclaims every value inserted so far and opens a new epoch.
    ///
    /// Returns the last reclaimed epoch.
    pub fn reclaim(&self) -> u64 {
        let epoch = self.state.epoch.fetch_add(1, Ordering::AcqRel);
        self.state.reclaimed_through.fetch_max(epoch, Ordering::AcqRel);
        debug!(epoch, "Reclaimed cached values");
        epoch
    }

    /// Reclaims values stamped with `epoch` or earlier.
    ///
    /// Epochs that have not been opened yet are clamped to the current one.
    pub fn reclaim_through(&self, epoch: u64) {
        let epoch = epoch.min(self.current_epoch());
        self.state.reclaimed_through.fetch_max(epoch, Ordering::AcqRel);
    }

    pub fn is_reclaimed(&self, epoch: u64) -> bool {
        epoch <= self.state.reclaimed_through.load(Ordering::Acquire)
    }

    /// Wakes the task waiting in [`notified`](Self::notified). A signal sent
    /// while nobody waits is kept and consumed by the next wait.
    pub fn signal(&self) {
        self.state.signal.notify_one();
    }

    pub async fn notified(&self) {
        self.state.signal.notified().await;
    }
}

impl fmt::Debug for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPressure")
            .field("epoch", &self.current_epoch())
            .field(
                "reclaimed_through",
                &self.state.reclaimed_through.load(Ordering::Acquire),
            )
            .finish()
    }
}

// == Reclaimable ==
/// A cached value tagged with its insertion epoch.
#[derive(Debug, Clone)]
pub struct Reclaimable<V> {
    pub epoch: u64,
    value: Option<V>,
}

impl<V: Clone> Reclaimable<V> {
    pub fn new(value: V, epoch: u64) -> Self {
        Self {
            epoch,
            value: Some(value),
        }
    }

    /// Returns the value unless `pressure` has reclaimed its epoch, in which
    /// case the value is dropped.
    fn upgrade(&mut self, pressure: &MemoryPressure) -> Option<V> {
        if pressure.is_reclaimed(self.epoch) {
            self.value = None;
        }
        self.value.clone()
    }

    pub fn is_live(&self) -> bool {
        self.value.is_some()
    }

    /// Drops the value if `pressure` has reclaimed its epoch. Returns true if
    /// a value was dropped.
    fn purge(&mut self, pressure: &MemoryPressure) -> bool {
        pressure.is_reclaimed(self.epoch) && self.value.take().is_some()
    }
}

// == Purgeable Cache ==
/// LRU cache of reclaimable values.
pub struct PurgeableCache<K, V> {
    inner: LruCache<K, Reclaimable<V>>,
    pressure: MemoryPressure,
}

impl<K, V> PurgeableCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a cache with its own pressure signal.
    pub fn new(max_entries: usize) -> Self {
        Self::with_pressure(max_entries, MemoryPressure::new())
    }

    /// Creates a cache reclaimed by a shared pressure signal.
    pub fn with_pressure(max_entries: usize, pressure: MemoryPressure) -> Self {
        Self {
            inner: LruCache::new(max_entries),
            pressure,
        }
    }

    pub fn with_watermarks(
        low_watermark: usize,
        high_watermark: usize,
        pressure: MemoryPressure,
    ) -> Result<Self> {
        Ok(Self {
            inner: LruCache::with_watermarks(low_watermark, high_watermark)?,
            pressure,
        })
    }

    /// Replaces the key comparison strategy. Existing entries are dropped.
    pub fn with_comparer(mut self, comparer: impl KeyComparer<K> + 'static) -> Self {
        self.inner = self.inner.with_comparer(comparer);
        self
    }

    pub fn pressure(&self) -> &MemoryPressure {
        &self.pressure
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    /// Releases every value whose epoch has been reclaimed. Keys stay
    /// indexed. Returns the number of values released.
    pub fn purge_reclaimed(&self) -> usize {
        let pressure = &self.pressure;
        let mut released = 0;
        self.inner.for_each_value_mut(|slot| {
            if slot.purge(pressure) {
                released += 1;
            }
        });
        if released > 0 {
            debug!(released, "Released reclaimed values");
        }
        released
    }

    /// Registers an observer for evicted entries whose values are still live.
    pub fn on_purged<F>(&self, handler: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.inner.on_purged(move |key, slot: &Reclaimable<V>| {
            if let Some(value) = &slot.value {
                handler(key, value);
            }
        });
    }
}

impl<K, V> Cache<K, V> for PurgeableCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn max_count(&self) -> usize {
        self.inner.max_count()
    }

    fn set_max_count(&self, max_count: usize) {
        self.inner.set_max_count(max_count);
    }

    fn try_get(&self, key: &K) -> Option<V> {
        let pressure = &self.pressure;
        self.inner.try_get_with(key, |slot| slot.upgrade(pressure))
    }

    fn put(&self, key: K, value: V) {
        let slot = Reclaimable::new(value, self.pressure.current_epoch());
        self.inner.put(key, slot);
    }

    fn remove(&self, key: &K) {
        self.inner.remove(key);
    }

    fn trim(&self) {
        self.purge_reclaimed();
        self.inner.trim();
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }
}

impl<K, V> fmt::Debug for PurgeableCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurgeableCache")
            .field("inner", &self.inner)
            .field("pressure", &self.pressure)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_purgeable_put_and_get() {
        let cache = PurgeableCache::new(10);

        cache.put(key("a"), 1u32);

        assert_eq!(cache.try_get(&key("a")), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reclaimed_value_misses_but_key_stays() {
        let cache = PurgeableCache::new(10);
        cache.put(key("a"), 1u32);

        cache.pressure().reclaim();

        assert_eq!(cache.try_get(&key("a")), None);
        assert_eq!(cache.keys(), vec!["a"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_after_reclaim_is_live() {
        let cache = PurgeableCache::new(10);
        cache.put(key("a"), 1u32);
        cache.pressure().reclaim();

        cache.put(key("a"), 2);
        cache.put(key("b"), 3);

        assert_eq!(cache.try_get(&key("a")), Some(2));
        assert_eq!(cache.try_get(&key("b")), Some(3));
    }

    #[test]
    fn test_reclaim_through_specific_epoch() {
        let pressure = MemoryPressure::new();
        let cache = PurgeableCache::with_pressure(10, pressure.clone());

        let first = pressure.current_epoch();
        cache.put(key("old"), 1u32);
        pressure.advance();
        cache.put(key("new"), 2);

        pressure.reclaim_through(first);

        assert_eq!(cache.try_get(&key("old")), None);
        assert_eq!(cache.try_get(&key("new")), Some(2));
    }

    #[test]
    fn test_reclaim_through_future_epoch_is_clamped() {
        let pressure = MemoryPressure::new();
        pressure.reclaim_through(1_000);

        let next = pressure.advance();
        assert!(!pressure.is_reclaimed(next));
    }

    #[test]
    fn test_shared_pressure_reclaims_all_caches() {
        let pressure = MemoryPressure::new();
        let first = PurgeableCache::with_pressure(4, pressure.clone());
        let second = PurgeableCache::with_pressure(4, pressure.clone());
        first.put(key("a"), 1u32);
        second.put(key("b"), 2u32);

        pressure.reclaim();

        assert_eq!(first.try_get(&key("a")), None);
        assert_eq!(second.try_get(&key("b")), None);
    }

    #[test]
    fn test_purgeable_watermarks_still_apply() {
        let cache = PurgeableCache::with_watermarks(2, 4, MemoryPressure::new()).unwrap();
        for i in 0..5u32 {
            cache.put(format!("k{}", i), i);
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec!["k4", "k3"]);
    }

    #[test]
    fn test_purged_observer_skips_reclaimed_values() {
        let cache = PurgeableCache::with_watermarks(1, 2, MemoryPressure::new()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cache.on_purged(move |k: &String, v: &u32| sink.lock().push((k.clone(), *v)));

        cache.put(key("a"), 1u32);
        cache.pressure().reclaim();
        cache.try_get(&key("a"));
        cache.put(key("b"), 2);
        cache.put(key("c"), 3);

        assert_eq!(*seen.lock(), vec![(key("b"), 2)]);
    }

    #[test]
    fn test_reclaimable_drops_value_on_upgrade() {
        let pressure = MemoryPressure::new();
        let mut slot = Reclaimable::new(5u32, pressure.current_epoch());
        assert!(slot.is_live());

        pressure.reclaim();

        assert_eq!(slot.upgrade(&pressure), None);
        assert!(!slot.is_live());
    }

    #[test]
    fn test_trim_releases_reclaimed_values() {
        let cache = PurgeableCache::new(10);
        let payload = Arc::new(vec![0u8; 1024]);
        cache.put(key("a"), payload.clone());
        assert_eq!(Arc::strong_count(&payload), 2);

        cache.pressure().reclaim();
        assert_eq!(Arc::strong_count(&payload), 2);

        cache.trim();

        assert_eq!(Arc::strong_count(&payload), 1);
        assert_eq!(cache.keys(), vec!["a"]);
    }

    #[test]
    fn test_purge_reclaimed_keeps_live_values() {
        let pressure = MemoryPressure::new();
        let cache = PurgeableCache::with_pressure(10, pressure.clone());
        let old = Arc::new(1u32);
        let new = Arc::new(2u32);
        cache.put(key("old"), old.clone());
        pressure.reclaim();
        cache.put(key("new"), new.clone());

        assert_eq!(cache.purge_reclaimed(), 1);
        assert_eq!(cache.purge_reclaimed(), 0);

        assert_eq!(Arc::strong_count(&old), 1);
        assert_eq!(Arc::strong_count(&new), 2);
        assert_eq!(cache.try_get(&key("new")).as_deref(), Some(&2));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_signal_before_wait_is_kept() {
        let pressure = MemoryPressure::new();
        pressure.signal();

        tokio::time::timeout(std::time::Duration::from_secs(1), pressure.notified())
            .await
            .expect("stored signal should be consumed");
    }

    #[tokio::test]
    async fn test_signal_wakes_waiter() {
        let pressure = MemoryPressure::new();
        let waiter = pressure.clone();
        let handle = tokio::spawn(async move { waiter.notified().await });

        tokio::task::yield_now().await;
        for _ in 0..10 {
            pressure.signal();
            if handle.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
