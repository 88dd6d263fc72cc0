//! Storage backends holding serialized database images.
//!
//! The engine hands a backend whole images as bytes; a backend only has to
//! make a write all-or-nothing.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Durable medium for database images.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Make the medium usable. Failure here is fatal for `open`.
    async fn acquire(&self) -> StoreResult<()>;
    /// Read the image for `name`; `None` when the database does not exist.
    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Replace the image for `name` atomically.
    async fn write(&self, name: &str, image: Vec<u8>) -> StoreResult<()>;
    /// Identity of the image for `name`. Backends that share a medium
    /// return the same location. Called after `acquire`.
    async fn locate(&self, name: &str) -> StoreResult<String>;
}

/// One JSON image file per database under a data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn image_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn acquire(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("cannot create {}: {e}", self.dir.display())))?;
        let meta = fs::metadata(&self.dir)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("cannot stat {}: {e}", self.dir.display())))?;
        if meta.permissions().readonly() {
            return Err(StoreError::StorageUnavailable(format!("{} is read-only", self.dir.display())));
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.image_path(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::StorageUnavailable(format!("cannot read {}: {e}", path.display()))),
        }
    }

    async fn write(&self, name: &str, image: Vec<u8>) -> StoreResult<()> {
        let path = self.image_path(name);
        let tmp = self.dir.join(format!(".{name}.json.tmp"));
        let len = image.len();
        fs::write(&tmp, image)
            .await
            .map_err(|e| StoreError::StorageFault(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::StorageFault(format!("cannot replace {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = len, "image written");
        Ok(())
    }

    async fn locate(&self, name: &str) -> StoreResult<String> {
        let dir = fs::canonicalize(&self.dir)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("cannot resolve {}: {e}", self.dir.display())))?;
        Ok(dir.join(format!("{name}.json")).display().to_string())
    }
}

/// Volatile backend. Clones share the same images, so a test can reopen
/// a database through a second handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn images(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.images.lock().map_err(|_| StoreError::StorageFault("memory backend lock poisoned".into()))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn acquire(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.images()?.get(name).cloned())
    }

    async fn write(&self, name: &str, image: Vec<u8>) -> StoreResult<()> {
        self.images()?.insert(name.to_string(), image);
        Ok(())
    }

    async fn locate(&self, name: &str) -> StoreResult<String> {
        Ok(format!("memory:{:p}/{name}", Arc::as_ptr(&self.images)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn file_backend_round_trip() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("store_backend_{}", Uuid::new_v4()));
        let backend = FileBackend::new(&dir);
        backend.acquire().await?;

        assert!(backend.read("db").await?.is_none());
        backend.write("db", b"{\"v\":1}".to_vec()).await?;
        backend.write("db", b"{\"v\":2}".to_vec()).await?;
        assert_eq!(backend.read("db").await?.as_deref(), Some(&b"{\"v\":2}"[..]));
        assert!(!dir.join(".db.json.tmp").exists());

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_backend_unavailable_when_dir_is_a_file() -> Result<(), anyhow::Error> {
        let file = std::env::temp_dir().join(format!("store_backend_file_{}", Uuid::new_v4()));
        tokio::fs::write(&file, b"not a dir").await?;
        let backend = FileBackend::new(file.join("nested"));
        let err = backend.acquire().await.unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
        let _ = tokio::fs::remove_file(&file).await;
        Ok(())
    }

    #[tokio::test]
    async fn memory_backend_clones_share_state() -> Result<(), anyhow::Error> {
        let a = MemoryBackend::new();
        let b = a.clone();
        a.write("db", vec![1, 2, 3]).await?;
        assert_eq!(b.read("db").await?, Some(vec![1, 2, 3]));
        assert_eq!(a.locate("db").await?, b.locate("db").await?);
        assert_ne!(a.locate("db").await?, MemoryBackend::new().locate("db").await?);
        Ok(())
    }

    #[tokio::test]
    async fn file_backends_over_one_dir_share_a_location() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("store_backend_loc_{}", Uuid::new_v4()));
        let a = FileBackend::new(&dir);
        a.acquire().await?;
        let b = FileBackend::new(dir.join("..").join(dir.file_name().unwrap_or_default()));
        assert_eq!(a.locate("db").await?, b.locate("db").await?);
        assert_ne!(a.locate("db").await?, a.locate("other").await?);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
