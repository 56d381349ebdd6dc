//! Durable storage medium behind the key-value store
//!
//! The backend trait isolates the physical medium so the store logic can be
//! exercised against an in-memory medium in tests while production runs on
//! the filesystem.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;

use crate::errors::StoreResult;

#[async_trait]
pub trait DurableBackend: Send + Sync {
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
    async fn clear(&self) -> StoreResult<()>;

    /// Total bytes currently committed to the medium
    async fn used_bytes(&self) -> StoreResult<u64>;

    /// Stored length of one key, zero when absent
    async fn value_len(&self, key: &str) -> StoreResult<u64> {
        Ok(self.read(key).await?.map(|v| v.len() as u64).unwrap_or(0))
    }
}

/// Filesystem medium: one file per key under a data directory.
///
/// File names are derived from a hash of the key so arbitrary key strings
/// never reach the filesystem.
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    async fn ensure_data_dir(&self) -> StoreResult<()> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir).await?;
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name = format!("{:x}", digest);
        self.data_dir.join(format!("{}.dat", &name[..32]))
    }
}

#[async_trait]
impl DurableBackend for FileBackend {
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        self.ensure_data_dir().await?;
        fs::write(self.path_for(key), bytes).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        if !self.data_dir.exists() {
            return Ok(());
        }
        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "dat") {
                fs::remove_file(path).await?;
            }
        }
        Ok(())
    }

    async fn used_bytes(&self) -> StoreResult<u64> {
        if !self.data_dir.exists() {
            return Ok(0);
        }
        let mut total = 0u64;
        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "dat") {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }
}

/// In-memory medium for tests.
#[derive(Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableBackend for MemoryBackend {
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.values.write().await.clear();
        Ok(())
    }

    async fn used_bytes(&self) -> StoreResult<u64> {
        Ok(self
            .values
            .read()
            .await
            .values()
            .map(|v| v.len() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_roundtrip() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let backend = FileBackend::new(dir.path().to_path_buf());

            assert_eq!(backend.read("catalog/items").await.unwrap(), None);

            backend.write("catalog/items", b"[1,2,3]").await.unwrap();
            assert_eq!(
                backend.read("catalog/items").await.unwrap(),
                Some(b"[1,2,3]".to_vec())
            );
            assert_eq!(backend.used_bytes().await.unwrap(), 7);

            backend.remove("catalog/items").await.unwrap();
            assert_eq!(backend.read("catalog/items").await.unwrap(), None);
            // removing an absent key is a no-op
            backend.remove("catalog/items").await.unwrap();
        });
    }

    #[test]
    fn test_file_backend_keys_map_to_distinct_files() {
        let backend = FileBackend::new(PathBuf::from("/tmp/unused"));
        assert_ne!(
            backend.path_for("catalog/items"),
            backend.path_for("catalog/cover-photos")
        );
    }

    #[test]
    fn test_memory_backend_accounting() {
        tokio_test::block_on(async {
            let backend = MemoryBackend::new();
            backend.write("a", &[0u8; 10]).await.unwrap();
            backend.write("b", &[0u8; 5]).await.unwrap();
            assert_eq!(backend.used_bytes().await.unwrap(), 15);
            assert_eq!(backend.value_len("a").await.unwrap(), 10);
            assert_eq!(backend.value_len("missing").await.unwrap(), 0);

            backend.clear().await.unwrap();
            assert_eq!(backend.used_bytes().await.unwrap(), 0);
        });
    }
}
