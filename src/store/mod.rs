//! Object Store Module
//!
//! The hierarchical key/value storage contract and its implementations:
//! - [`FolderStore`] persists one file per key, one directory per child store
//! - [`CachingStore`] adds a read-through, write-invalidate cache
//! - [`EncryptedStore`] encrypts typed values before they reach the inner store
//!
//! Decorators wrap any `Arc<dyn ObjectStore>`, so stacks compose freely.

mod caching;
mod encrypted;
mod folder;
mod serializer;
mod value;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, StoreError};

pub use caching::{CachingStore, SharedCache};
pub use encrypted::EncryptedStore;
pub use folder::FolderStore;
pub use serializer::{decode_value, encode_value, JsonSerializer, Serializer};
pub use value::{StoreValue, Value, ValueType};

pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;
pub type SharedStore = Arc<dyn ObjectStore>;

// == Object Store ==
/// A hierarchical key/value store.
///
/// Missing keys are not errors: lookups return `Ok(None)`, existence checks
/// return `Ok(false)`, and timestamps return [`DateTime::<Utc>::MIN_UTC`].
/// Stored data that cannot be read as the requested type is treated as
/// missing. Only invalid keys and backing-store I/O failures are errors.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn key_exists(&self, key: &str) -> Result<bool>;

    /// Last write time of `key`, or `MIN_UTC` if absent.
    async fn update_timestamp(&self, key: &str) -> Result<DateTime<Utc>>;

    /// Keys in this namespace, in no particular order. Child stores are not
    /// keys.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Removes every key and child store under this namespace.
    async fn delete_all(&self) -> Result<()>;

    /// Removes `key`. Absent keys are ignored.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn get(&self, key: &str, ty: ValueType) -> Result<Option<Value>>;

    /// Like [`get`](Self::get), but bypasses any caching between the caller
    /// and the ground truth.
    async fn refresh_and_get(&self, key: &str, ty: ValueType) -> Result<Option<Value>>;

    /// Replaces the value at `key`. `None` deletes the key.
    async fn put(&self, key: &str, value: Option<Value>) -> Result<()>;

    /// Raw bytes of `key`, bypassing typed decoding.
    async fn open_read_stream(&self, key: &str) -> Result<Option<ReadStream>>;

    /// A writer that replaces the whole resource at `key`.
    async fn open_write_stream(&self, key: &str) -> Result<WriteStream>;

    async fn child_store_exists(&self, name: &str) -> Result<bool>;

    /// Opens the named child store, creating it if needed.
    async fn create_child_store(&self, name: &str) -> Result<SharedStore>;

    /// Removes the named child store and everything under it.
    async fn delete_child_store(&self, name: &str) -> Result<()>;
}

// == Typed Access ==
/// Typed conveniences over [`ObjectStore`].
#[async_trait]
pub trait ObjectStoreExt: ObjectStore {
    async fn get_as<T: StoreValue>(&self, key: &str) -> Result<Option<Arc<T>>> {
        let value = self.get(key, ValueType::of::<T>()).await?;
        Ok(value.and_then(|v| v.downcast::<T>()))
    }

    async fn refresh_and_get_as<T: StoreValue>(&self, key: &str) -> Result<Option<Arc<T>>> {
        let value = self.refresh_and_get(key, ValueType::of::<T>()).await?;
        Ok(value.and_then(|v| v.downcast::<T>()))
    }

    async fn put_value<T: StoreValue>(&self, key: &str, value: T) -> Result<()> {
        self.put(key, Some(Value::new(value))).await
    }
}

impl<S: ObjectStore + ?Sized> ObjectStoreExt for S {}

// == Validation ==
/// Rejects keys that cannot name a resource: empty, containing a path
/// separator or NUL, `.`/`..`, or starting with the reserved `.` prefix.
pub fn validate_key(key: &str) -> Result<()> {
    check_name(key).map_err(|reason| StoreError::InvalidKey(format!("{:?}: {}", key, reason)))
}

/// Same rules as [`validate_key`], for child store names.
pub fn validate_name(name: &str) -> Result<()> {
    check_name(name).map_err(|reason| StoreError::InvalidName(format!("{:?}: {}", name, reason)))
}

fn check_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("must not be empty");
    }
    if name.starts_with('.') {
        return Err("must not start with '.'");
    }
    if name.contains(['/', '\\', '\0']) {
        return Err("must not contain path separators or NUL");
    }
    Ok(())
}
