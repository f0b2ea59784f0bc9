//! Encrypted Store
//!
//! Encrypts typed values before they reach the inner store and decrypts them
//! on the way out. Only `get`, `refresh_and_get` and `put` transform data;
//! raw streams and metadata pass straight through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::{Cryptographer, EncryptedPayload, KeyMaterial};
use crate::error::Result;
use crate::store::{
    decode_value, encode_value, validate_key, ObjectStore, ReadStream, Serializer, SharedStore,
    Value, ValueType, WriteStream,
};

// == Encrypted Store ==
#[derive(Clone)]
pub struct EncryptedStore {
    inner: SharedStore,
    cryptographer: Arc<dyn Cryptographer>,
    key: Arc<KeyMaterial>,
    serializer: Arc<dyn Serializer>,
}

impl EncryptedStore {
    pub fn new(
        inner: SharedStore,
        cryptographer: Arc<dyn Cryptographer>,
        key: Arc<KeyMaterial>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        Self {
            inner,
            cryptographer,
            key,
            serializer,
        }
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    /// Decrypts a payload read from the inner store. Anything that cannot be
    /// decrypted or decoded as `ty` reads as absent.
    fn open_payload(&self, key: &str, payload: Option<Value>, ty: ValueType) -> Option<Value> {
        let payload = payload?.downcast::<EncryptedPayload>()?;

        let plaintext = match self.cryptographer.decrypt(&self.key, &payload) {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(e) => {
                warn!(key, error = %e, "Cannot decrypt stored value, treating as missing");
                return None;
            }
        };

        match decode_value(self.serializer.as_ref(), &plaintext, ty) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, expected = ty.name(), error = %e, "Decrypted value is unreadable, treating as missing");
                None
            }
        }
    }
}

#[async_trait]
impl ObjectStore for EncryptedStore {
    async fn key_exists(&self, key: &str) -> Result<bool> {
        self.inner.key_exists(key).await
    }

    async fn update_timestamp(&self, key: &str) -> Result<DateTime<Utc>> {
        self.inner.update_timestamp(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.inner.list_keys().await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        let payload = self
            .inner
            .get(key, ValueType::of::<EncryptedPayload>())
            .await?;
        Ok(self.open_payload(key, payload, ty))
    }

    async fn refresh_and_get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        let payload = self
            .inner
            .refresh_and_get(key, ValueType::of::<EncryptedPayload>())
            .await?;
        Ok(self.open_payload(key, payload, ty))
    }

    async fn put(&self, key: &str, value: Option<Value>) -> Result<()> {
        let Some(value) = value else {
            return self.delete(key).await;
        };

        validate_key(key)?;
        let plaintext = Zeroizing::new(encode_value(self.serializer.as_ref(), &value)?);
        let payload = self.cryptographer.encrypt(&self.key, &plaintext)?;
        self.inner.put(key, Some(Value::new(payload))).await
    }

    async fn open_read_stream(&self, key: &str) -> Result<Option<ReadStream>> {
        self.inner.open_read_stream(key).await
    }

    async fn open_write_stream(&self, key: &str) -> Result<WriteStream> {
        self.inner.open_write_stream(key).await
    }

    async fn child_store_exists(&self, name: &str) -> Result<bool> {
        self.inner.child_store_exists(name).await
    }

    async fn create_child_store(&self, name: &str) -> Result<SharedStore> {
        let child = self.inner.create_child_store(name).await?;
        Ok(Arc::new(EncryptedStore {
            inner: child,
            ..self.clone()
        }))
    }

    async fn delete_child_store(&self, name: &str) -> Result<()> {
        self.inner.delete_child_store(name).await
    }
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("algorithm", &self.cryptographer.algorithm())
            .field("key", &self.key)
            .finish()
    }
}
