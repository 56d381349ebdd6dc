//! Quota accounting over the durable namespace
//!
//! Usage is re-derived from the store on every query instead of being kept
//! as a running counter. Partial or failed writes can never leave a counter
//! out of sync with the medium this way.

use std::sync::Arc;

use crate::errors::StoreResult;
use crate::models::StorageInfo;

use super::PersistentKeyValueStore;

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<PersistentKeyValueStore>,
    capacity_bytes: u64,
}

impl QuotaLedger {
    pub fn new(store: Arc<PersistentKeyValueStore>, capacity_bytes: u64) -> Self {
        Self {
            store,
            capacity_bytes,
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub async fn used_bytes(&self) -> StoreResult<u64> {
        self.store.used_bytes().await
    }

    pub async fn usage_fraction(&self) -> StoreResult<f64> {
        let used = self.used_bytes().await?;
        if self.capacity_bytes == 0 {
            return Ok(1.0);
        }
        Ok(used as f64 / self.capacity_bytes as f64)
    }

    /// Admission check for replacing `key` with a value of `candidate_len`
    /// bytes.
    ///
    /// The candidate is the prospective serialized size of the entire list
    /// after the mutation, measured on the real payload. Bytes currently
    /// held by `key` itself are being replaced, so only the other keys'
    /// usage counts against the candidate.
    pub async fn can_admit(&self, key: &str, candidate_len: u64) -> StoreResult<bool> {
        let used = self.store.used_bytes().await?;
        let current = self.store.value_len(key).await?;
        let used_by_others = used.saturating_sub(current);
        let admitted = used_by_others + candidate_len <= self.capacity_bytes;

        tracing::debug!(
            "Quota admission: key={}, candidate {} bytes, {} held by other keys, capacity {} -> {}",
            key,
            candidate_len,
            used_by_others,
            self.capacity_bytes,
            if admitted { "admit" } else { "refuse" }
        );

        Ok(admitted)
    }

    /// Bytes still available to `key` on top of what it already holds
    pub async fn available_for(&self, key: &str) -> StoreResult<u64> {
        let used = self.store.used_bytes().await?;
        let current = self.store.value_len(key).await?;
        Ok(self
            .capacity_bytes
            .saturating_sub(used.saturating_sub(current)))
    }

    pub async fn storage_info(&self) -> StoreResult<StorageInfo> {
        Ok(StorageInfo {
            used_bytes: self.used_bytes().await?,
            capacity_bytes: self.capacity_bytes,
        })
    }
}
