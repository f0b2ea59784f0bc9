//! Caching Store
//!
//! Read-through, write-invalidate decorator. Typed reads are served from an
//! in-memory cache when possible; every mutation invalidates the affected key
//! before and after the inner write.
//!
//! Invalidations also advance a write generation. A read that misses records
//! the generation before going to the inner store and only populates the
//! cache if no invalidation happened in between, so a read that overlaps a
//! write can return the old value but never leaves it cached.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::error::Result;
use crate::store::{
    validate_key, ObjectStore, ReadStream, SharedStore, Value, ValueType, WriteStream,
};

pub type SharedCache = Arc<dyn Cache<String, Value>>;

// == Caching Store ==
pub struct CachingStore {
    inner: SharedStore,
    cache: SharedCache,
    /// Write generation, bumped by every invalidation
    generation: Mutex<u64>,
}

impl CachingStore {
    pub fn new(inner: SharedStore, cache: SharedCache) -> Self {
        info!(max_count = cache.max_count(), "Caching store enabled");
        Self {
            inner,
            cache,
            generation: Mutex::new(0),
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    fn cached(&self, key: &str, ty: ValueType) -> Option<Value> {
        let value = self.cache.try_get(&key.to_string())?;
        // A value cached under another type is a miss for this reader
        (value.value_type() == ty).then_some(value)
    }

    fn current_generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Caches `value` unless an invalidation ran since `generation` was read.
    fn populate(&self, key: &str, value: &Value, generation: u64) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        self.cache.put(key.to_string(), value.clone());
        true
    }

    fn invalidate(&self, key: &str) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.cache.remove(&key.to_string());
    }

    fn invalidate_all(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.cache.clear();
    }

    async fn read_through(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        let generation = self.current_generation();
        let value = self.inner.get(key, ty).await?;
        match &value {
            Some(value) if self.populate(key, value, generation) => {
                debug!(key, "Cache miss, populated from inner store");
            }
            Some(_) => debug!(key, "Cache miss, write raced the read, not populated"),
            None => debug!(key, "Cache miss, not in inner store"),
        }
        Ok(value)
    }
}

#[async_trait]
impl ObjectStore for CachingStore {
    async fn key_exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        if self.cache.try_get(&key.to_string()).is_some() {
            return Ok(true);
        }
        self.inner.key_exists(key).await
    }

    async fn update_timestamp(&self, key: &str) -> Result<DateTime<Utc>> {
        self.inner.update_timestamp(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.inner.list_keys().await
    }

    async fn delete_all(&self) -> Result<()> {
        self.invalidate_all();
        let result = self.inner.delete_all().await;
        self.invalidate_all();
        result
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.invalidate(key);
        let result = self.inner.delete(key).await;
        self.invalidate(key);
        result
    }

    async fn get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        validate_key(key)?;
        if let Some(value) = self.cached(key, ty) {
            debug!(key, "Cache hit");
            return Ok(Some(value));
        }
        self.read_through(key, ty).await
    }

    async fn refresh_and_get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        validate_key(key)?;
        self.invalidate(key);
        let generation = self.current_generation();
        let value = self.inner.refresh_and_get(key, ty).await?;
        if let Some(value) = &value {
            self.populate(key, value, generation);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: Option<Value>) -> Result<()> {
        validate_key(key)?;
        self.invalidate(key);
        let result = self.inner.put(key, value).await;
        self.invalidate(key);
        result
    }

    async fn open_read_stream(&self, key: &str) -> Result<Option<ReadStream>> {
        self.inner.open_read_stream(key).await
    }

    async fn open_write_stream(&self, key: &str) -> Result<WriteStream> {
        // Raw writes bypass typed values, so any cached copy is stale
        self.invalidate(key);
        self.inner.open_write_stream(key).await
    }

    async fn child_store_exists(&self, name: &str) -> Result<bool> {
        self.inner.child_store_exists(name).await
    }

    async fn create_child_store(&self, name: &str) -> Result<SharedStore> {
        self.inner.create_child_store(name).await
    }

    async fn delete_child_store(&self, name: &str) -> Result<()> {
        self.inner.delete_child_store(name).await
    }
}
