//! Store Stack Builder
//!
//! Assembles the standard stack from a [`StoreConfig`]: a folder store at the
//! configured root, wrapped by an encrypting store when a key is configured,
//! wrapped by a caching store when caching is enabled.

use std::sync::Arc;

use tracing::info;

use crate::cache::{LruCache, MemoryPressure, PurgeableCache};
use crate::config::StoreConfig;
use crate::crypto::{AesGcmCryptographer, Cryptographer};
use crate::error::Result;
use crate::store::{
    CachingStore, EncryptedStore, FolderStore, JsonSerializer, Serializer, SharedCache,
    SharedStore, Value,
};

/// An assembled store and the handles needed to manage it.
#[derive(Clone)]
pub struct StoreStack {
    /// Outermost store of the stack
    pub store: SharedStore,
    /// Cache behind the caching layer, if one was built
    pub cache: Option<SharedCache>,
    /// Pressure signal shared with a purgeable cache
    pub pressure: MemoryPressure,
}

impl StoreStack {
    /// Caches to register with the pressure task.
    pub fn caches(&self) -> Vec<SharedCache> {
        self.cache.iter().cloned().collect()
    }
}

/// Opens the stack described by `config` with JSON serialization and
/// AES-256-GCM encryption.
pub async fn open_store(config: &StoreConfig) -> Result<StoreStack> {
    open_store_with(
        config,
        Arc::new(JsonSerializer::new()),
        Arc::new(AesGcmCryptographer::new()),
    )
    .await
}

/// Opens the stack described by `config` with the given collaborators.
pub async fn open_store_with(
    config: &StoreConfig,
    serializer: Arc<dyn Serializer>,
    cryptographer: Arc<dyn Cryptographer>,
) -> Result<StoreStack> {
    config.validate()?;

    let mut store: SharedStore =
        Arc::new(FolderStore::root(&config.root, serializer.clone()).await?);

    if let Some(key) = config.key_material()? {
        info!(algorithm = cryptographer.algorithm(), "Encryption enabled");
        store = Arc::new(EncryptedStore::new(
            store,
            cryptographer,
            Arc::new(key),
            serializer,
        ));
    }

    let pressure = MemoryPressure::new();
    let cache: Option<SharedCache> = if !config.caching_enabled() {
        None
    } else if config.purgeable {
        Some(Arc::new(PurgeableCache::<String, Value>::with_watermarks(
            config.low_watermark,
            config.max_entries,
            pressure.clone(),
        )?))
    } else {
        Some(Arc::new(LruCache::<String, Value>::with_watermarks(
            config.low_watermark,
            config.max_entries,
        )?))
    };

    if let Some(cache) = &cache {
        store = Arc::new(CachingStore::new(store, cache.clone()));
    }

    info!(
        root = %config.root.display(),
        cached = cache.is_some(),
        purgeable = config.purgeable,
        "Store stack opened"
    );

    Ok(StoreStack {
        store,
        cache,
        pressure,
    })
}
