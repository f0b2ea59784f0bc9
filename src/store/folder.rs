//! Folder Store
//!
//! Durable object store over a directory tree: each key is a file in the
//! store's directory and each child store is a subdirectory of the same name.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{
    decode_value, encode_value, validate_key, validate_name, ObjectStore, ReadStream, Serializer,
    SharedStore, Value, ValueType, WriteStream,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// == Folder Store ==
#[derive(Clone)]
pub struct FolderStore {
    folder: PathBuf,
    serializer: Arc<dyn Serializer>,
}

impl FolderStore {
    /// Wraps an existing directory.
    pub fn new(folder: impl Into<PathBuf>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            folder: folder.into(),
            serializer,
        }
    }

    /// Opens the root store at `folder`, creating the directory if needed.
    pub async fn root(folder: impl Into<PathBuf>, serializer: Arc<dyn Serializer>) -> Result<Self> {
        let folder = folder.into();
        fs::create_dir_all(&folder).await?;
        info!(root = %folder.display(), "Opened folder store");
        Ok(Self::new(folder, serializer))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// On-disk location of `key`, whether or not it exists.
    pub fn resource_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.folder.join(key))
    }

    fn child_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.folder.join(name))
    }

    /// Metadata of the file behind `key`, if it is a file.
    async fn file_metadata(&self, key: &str) -> Result<Option<std::fs::Metadata>> {
        let path = self.resource_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_resource(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resource_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // A child store of the same name is not a resource
            Err(_) if is_directory(&path).await => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `bytes` to a hidden temporary file and renames it over the
    /// target, so readers see either the old or the new resource.
    ///
    /// The staging name has a fixed length independent of `key`, so any key
    /// short enough for a direct write is also short enough for this path.
    async fn write_resource(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resource_path(key)?;
        let staging = self
            .folder
            .join(format!(".{:016x}.tmp", rand::random::<u64>()));

        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn is_directory(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Empties `folder` depth-first: each subdirectory is emptied and removed
/// before the files of `folder` itself are deleted.
fn clear_folder(folder: PathBuf) -> BoxFuture<'static, std::io::Result<()>> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                clear_folder(path.clone()).await?;
                fs::remove_dir(&path).await?;
            } else {
                files.push(path);
            }
        }

        for file in files {
            match fs::remove_file(&file).await {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    })
}

#[async_trait]
impl ObjectStore for FolderStore {
    async fn key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.file_metadata(key).await?.is_some())
    }

    async fn update_timestamp(&self, key: &str) -> Result<DateTime<Utc>> {
        match self.file_metadata(key).await? {
            Some(meta) => Ok(DateTime::<Utc>::from(meta.modified()?)),
            None => Ok(DateTime::<Utc>::MIN_UTC),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Non-UTF-8 names and staging files are not keys
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn delete_all(&self) -> Result<()> {
        clear_folder(self.folder.clone()).await?;
        info!(folder = %self.folder.display(), "Deleted all keys and child stores");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resource_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            // A child store of the same name is not a key
            Err(_) if is_directory(&path).await => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        let Some(bytes) = self.read_resource(key).await? else {
            return Ok(None);
        };

        match decode_value(self.serializer.as_ref(), &bytes, ty) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, expected = ty.name(), error = %e, "Stored value is unreadable, treating as missing");
                Ok(None)
            }
        }
    }

    async fn refresh_and_get(&self, key: &str, ty: ValueType) -> Result<Option<Value>> {
        self.get(key, ty).await
    }

    async fn put(&self, key: &str, value: Option<Value>) -> Result<()> {
        let Some(value) = value else {
            return self.delete(key).await;
        };

        validate_key(key)?;
        let bytes = encode_value(self.serializer.as_ref(), &value)?;
        self.write_resource(key, &bytes).await?;
        debug!(key, bytes = bytes.len(), "Stored value");
        Ok(())
    }

    async fn open_read_stream(&self, key: &str) -> Result<Option<ReadStream>> {
        let path = self.resource_path(key)?;
        match fs::File::open(&path).await {
            Ok(file) => {
                if file.metadata().await?.is_file() {
                    Ok(Some(Box::new(file)))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(_) if is_directory(&path).await => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn open_write_stream(&self, key: &str) -> Result<WriteStream> {
        let path = self.resource_path(key)?;
        let file = fs::File::create(&path).await?;
        Ok(Box::new(file))
    }

    async fn child_store_exists(&self, name: &str) -> Result<bool> {
        let path = self.child_path(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_child_store(&self, name: &str) -> Result<SharedStore> {
        let path = self.child_path(name)?;
        fs::create_dir_all(&path).await?;
        Ok(Arc::new(FolderStore::new(path, self.serializer.clone())))
    }

    async fn delete_child_store(&self, name: &str) -> Result<()> {
        let path = self.child_path(name)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(child = name, "Deleted child store");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for FolderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderStore")
            .field("folder", &self.folder)
            .finish()
    }
}
