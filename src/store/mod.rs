//! Process-wide persistent key-value store
//!
//! Two independent namespaces: a durable one that survives process restart
//! (the catalog and cover-photo lists live here) and a transient one that
//! dies with the session (full-resolution upload copies). The durable
//! namespace enforces the medium's own hard byte ceiling on every write,
//! independent of the application's logical quota.

pub mod backend;
pub mod ledger;

pub use backend::{DurableBackend, FileBackend, MemoryBackend};
pub use ledger::QuotaLedger;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::{StoreError, StoreResult};

pub struct PersistentKeyValueStore {
    backend: Arc<dyn DurableBackend>,
    transient: RwLock<HashMap<String, Vec<u8>>>,
    hard_limit_bytes: u64,
}

impl PersistentKeyValueStore {
    pub fn new(backend: Arc<dyn DurableBackend>, hard_limit_bytes: u64) -> Self {
        Self {
            backend,
            transient: RwLock::new(HashMap::new()),
            hard_limit_bytes,
        }
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.backend.read(key).await
    }

    /// Write to the durable namespace.
    ///
    /// Fails with [`StoreError::QuotaExceeded`] when the write would push the
    /// medium past its hard ceiling. The ceiling is checked against the
    /// post-write total, so replacing a value only charges the delta.
    pub async fn set(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let used = self.backend.used_bytes().await?;
        let current = self.backend.value_len(key).await?;
        let projected = used.saturating_sub(current) + bytes.len() as u64;

        if projected > self.hard_limit_bytes {
            tracing::warn!(
                "Durable write refused by medium ceiling: key={}, projected {} of {} bytes",
                key,
                projected,
                self.hard_limit_bytes
            );
            return Err(StoreError::QuotaExceeded {
                attempted: projected,
                limit: self.hard_limit_bytes,
            });
        }

        self.backend.write(key, bytes).await
    }

    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        self.backend.remove(key).await
    }

    /// Clear both namespaces.
    pub async fn clear_all(&self) -> StoreResult<()> {
        self.backend.clear().await?;
        self.transient.write().await.clear();
        Ok(())
    }

    /// Total bytes committed to the durable namespace
    pub async fn used_bytes(&self) -> StoreResult<u64> {
        self.backend.used_bytes().await
    }

    /// Stored length of one durable key, zero when absent
    pub async fn value_len(&self, key: &str) -> StoreResult<u64> {
        self.backend.value_len(key).await
    }

    pub async fn get_transient(&self, key: &str) -> Option<Vec<u8>> {
        self.transient.read().await.get(key).cloned()
    }

    /// Transient writes are session-scoped and never quota-checked.
    pub async fn set_transient(&self, key: &str, bytes: Vec<u8>) {
        self.transient.write().await.insert(key.to_string(), bytes);
    }

    pub async fn remove_transient(&self, key: &str) {
        self.transient.write().await.remove(key);
    }

    /// Drop everything session-scoped; durable data is untouched.
    pub async fn clear_session(&self) {
        self.transient.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store(hard_limit: u64) -> PersistentKeyValueStore {
        PersistentKeyValueStore::new(Arc::new(MemoryBackend::new()), hard_limit)
    }

    #[test]
    fn test_durable_roundtrip() {
        tokio_test::block_on(async {
            let store = memory_store(1024);
            store.set("catalog/items", b"[]").await.unwrap();
            assert_eq!(
                store.get("catalog/items").await.unwrap(),
                Some(b"[]".to_vec())
            );
            store.remove("catalog/items").await.unwrap();
            assert_eq!(store.get("catalog/items").await.unwrap(), None);
        });
    }

    #[test]
    fn test_hard_ceiling_refuses_oversized_writes() {
        tokio_test::block_on(async {
            let store = memory_store(10);
            store.set("a", &[0u8; 8]).await.unwrap();

            let err = store.set("b", &[0u8; 8]).await.unwrap_err();
            assert!(matches!(err, StoreError::QuotaExceeded { .. }));
            // the refused write left the namespace unchanged
            assert_eq!(store.used_bytes().await.unwrap(), 8);
        });
    }

    #[test]
    fn test_replacing_a_value_charges_only_the_delta() {
        tokio_test::block_on(async {
            let store = memory_store(10);
            store.set("a", &[0u8; 8]).await.unwrap();
            // 8 stored + 9 new - 8 replaced = 9, still under the ceiling
            store.set("a", &[0u8; 9]).await.unwrap();
            assert_eq!(store.used_bytes().await.unwrap(), 9);
        });
    }

    #[test]
    fn test_transient_namespace_is_session_scoped() {
        tokio_test::block_on(async {
            let store = memory_store(1024);
            store.set("durable", b"keep").await.unwrap();
            store.set_transient("original/abc", vec![1, 2, 3]).await;

            assert_eq!(
                store.get_transient("original/abc").await,
                Some(vec![1, 2, 3])
            );

            store.clear_session().await;
            assert_eq!(store.get_transient("original/abc").await, None);
            assert_eq!(store.get("durable").await.unwrap(), Some(b"keep".to_vec()));
        });
    }
}
