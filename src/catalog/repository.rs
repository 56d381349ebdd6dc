//! Catalog repository: the single writer over the persistent store
//!
//! Owns the in-memory item and cover-photo lists, mediates every mutation,
//! and re-serializes to the durable namespace after each one. Image
//! admission runs through the compression pipeline and the quota ledger;
//! writes that fail at the medium fall back to a degraded commit with the
//! mutation's images stripped.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::codec::{BinaryCodec, ThumbnailGenerator};
use crate::config::{CatalogLimits, Config};
use crate::errors::{CatalogError, CatalogResult, StoreError};
use crate::models::{
    CatalogItem, CatalogQuery, CommitOutcome, CompressedImage, EvictionReport, ImageRef,
    ItemDraft, ItemPatch, MutationReceipt, SortField, SortOrder, StorageInfo,
};
use crate::store::{DurableBackend, FileBackend, PersistentKeyValueStore, QuotaLedger};

use super::eviction::{EvictionPolicy, EvictionStrategy};
use super::seed;

/// Durable key holding the serialized item list
pub const ITEMS_KEY: &str = "catalog/items";
/// Durable key holding the serialized cover-photo list
pub const COVER_PHOTOS_KEY: &str = "catalog/cover-photos";

fn original_key(image_id: Uuid) -> String {
    format!("original/{}", image_id)
}

struct CatalogState {
    items: Vec<CatalogItem>,
    cover_photos: Vec<ImageRef>,
}

/// Result of walking a mutation's uploads through compression and quota
/// admission
#[derive(Default)]
struct Admission {
    accepted: Vec<CompressedImage>,
    /// Raw blobs retained for the transient namespace, keyed by image id
    originals: Vec<(Uuid, Vec<u8>)>,
    /// Uploads that decoded and compressed successfully
    compressible: usize,
    /// The quota refused an image and the remainder was truncated
    quota_stopped: bool,
    /// Projected catalog size of the first refused image
    refused_projected: u64,
}

pub struct CatalogRepository {
    store: Arc<PersistentKeyValueStore>,
    ledger: QuotaLedger,
    codec: BinaryCodec,
    thumbnails: ThumbnailGenerator,
    policy: EvictionPolicy,
    limits: CatalogLimits,
    // One mutex = the mutation queue of depth 1. Every mutating call holds
    // it across compress, quota check, and persist.
    state: Mutex<CatalogState>,
}

impl CatalogRepository {
    /// Open the repository on the configured data directory.
    pub async fn open(config: &Config) -> CatalogResult<Self> {
        let backend = Arc::new(FileBackend::new(config.storage.data_dir.clone()));
        Self::open_with_backend(backend, config).await
    }

    /// Open on an explicit durable medium. Loads both lists, seeding the
    /// durable namespace when it is empty.
    pub async fn open_with_backend(
        backend: Arc<dyn DurableBackend>,
        config: &Config,
    ) -> CatalogResult<Self> {
        let store = Arc::new(PersistentKeyValueStore::new(
            backend,
            config.storage.hard_limit_bytes,
        ));
        let ledger = QuotaLedger::new(store.clone(), config.quota.capacity_bytes);

        let items: Vec<CatalogItem> = match store.get(ITEMS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::from)?,
            None => {
                let seeded = seed::sample_items();
                let bytes = serde_json::to_vec(&seeded).map_err(StoreError::from)?;
                store.set(ITEMS_KEY, &bytes).await?;
                tracing::info!("Seeded catalog with {} sample items", seeded.len());
                seeded
            }
        };

        let cover_photos: Vec<ImageRef> = match store.get(COVER_PHOTOS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::from)?,
            None => {
                let seeded = seed::sample_cover_photos();
                let bytes = serde_json::to_vec(&seeded).map_err(StoreError::from)?;
                store.set(COVER_PHOTOS_KEY, &bytes).await?;
                seeded
            }
        };

        tracing::info!(
            "Catalog opened: {} item(s), {} cover photo(s)",
            items.len(),
            cover_photos.len()
        );

        Ok(Self {
            store,
            ledger,
            codec: BinaryCodec::new(config.compression.clone()),
            thumbnails: ThumbnailGenerator::new(config.thumbnail.clone()),
            policy: EvictionPolicy::new(config.quota.eviction_threshold),
            limits: config.catalog.clone(),
            state: Mutex::new(CatalogState {
                items,
                cover_photos,
            }),
        })
    }

    /// Create an item from an admin draft plus raw image uploads.
    ///
    /// Uploads are compressed in submission order; an upload that fails to
    /// decode is skipped. The moment the projected catalog would exceed
    /// quota the remaining uploads are silently truncated; when none of the
    /// compressible uploads can be admitted at all, the whole mutation is
    /// rejected. A durable write failure falls back once to a degraded
    /// commit with `images: []` on the new item.
    pub async fn add_item(
        &self,
        draft: ItemDraft,
        raw_images: &[Vec<u8>],
    ) -> CatalogResult<MutationReceipt> {
        let mut state = self.state.lock().await;
        let mut item = CatalogItem::from_draft(draft);

        tracing::info!(
            "Adding catalog item {} ({} {}) with {} upload(s)",
            item.id,
            item.brand,
            item.model,
            raw_images.len()
        );

        let admission = self
            .admit_images(
                &state.items,
                &item,
                None,
                raw_images,
                self.limits.max_images_per_item,
            )
            .await?;
        self.check_rejection(&admission).await?;

        item.images = admission
            .accepted
            .iter()
            .cloned()
            .map(|image| ImageRef::Embedded { image })
            .collect();
        state.items.push(item);

        let new_index = state.items.len() - 1;
        let outcome = match self.persist_items(&state.items).await {
            Ok(()) => CommitOutcome::Committed,
            Err(e) => {
                tracing::warn!(
                    "Catalog write failed ({}); retrying without the new item's images",
                    e
                );
                state.items[new_index].images.clear();
                match self.persist_items(&state.items).await {
                    Ok(()) => CommitOutcome::Degraded,
                    Err(e) => {
                        tracing::error!("Degraded catalog write failed: {}", e);
                        state.items.pop();
                        return Err(CatalogError::storage_exhausted(e.to_string()));
                    }
                }
            }
        };

        let images_accepted = match outcome {
            CommitOutcome::Committed => {
                self.retain_originals(admission.originals).await;
                admission.accepted.len()
            }
            CommitOutcome::Degraded => 0,
        };

        Ok(MutationReceipt {
            item: state.items[new_index].clone(),
            outcome,
            images_accepted,
            images_dropped: raw_images.len().saturating_sub(images_accepted),
        })
    }

    /// Patch an existing item and append new image uploads.
    ///
    /// The combined image list keeps existing + new up to the per-item cap;
    /// the excess is dropped from the tail. Quota pre-check and degraded
    /// fallback behave exactly as in [`Self::add_item`], except the degraded
    /// retry drops only the images this mutation added.
    pub async fn update_item(
        &self,
        id: Uuid,
        patch: ItemPatch,
        raw_images: &[Vec<u8>],
    ) -> CatalogResult<MutationReceipt> {
        let mut state = self.state.lock().await;
        let index = state
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CatalogError::not_found("catalog item", id.to_string()))?;

        let original = state.items[index].clone();
        let mut updated = original.clone();
        updated.apply_patch(patch);

        let slots = self
            .limits
            .max_images_per_item
            .saturating_sub(updated.images.len());
        let admission = self
            .admit_images(&state.items, &updated, Some(index), raw_images, slots)
            .await?;
        self.check_rejection(&admission).await?;

        updated.images.extend(
            admission
                .accepted
                .iter()
                .cloned()
                .map(|image| ImageRef::Embedded { image }),
        );
        let existing_count = original.images.len();
        state.items[index] = updated;

        let outcome = match self.persist_items(&state.items).await {
            Ok(()) => CommitOutcome::Committed,
            Err(e) => {
                tracing::warn!(
                    "Catalog write failed ({}); retrying without the update's new images",
                    e
                );
                state.items[index].images.truncate(existing_count);
                match self.persist_items(&state.items).await {
                    Ok(()) => CommitOutcome::Degraded,
                    Err(e) => {
                        tracing::error!("Degraded catalog write failed: {}", e);
                        state.items[index] = original;
                        return Err(CatalogError::storage_exhausted(e.to_string()));
                    }
                }
            }
        };

        let images_accepted = match outcome {
            CommitOutcome::Committed => {
                self.retain_originals(admission.originals).await;
                admission.accepted.len()
            }
            CommitOutcome::Degraded => 0,
        };

        Ok(MutationReceipt {
            item: state.items[index].clone(),
            outcome,
            images_accepted,
            images_dropped: raw_images.len().saturating_sub(images_accepted),
        })
    }

    /// Remove an item and release everything it owns. Idempotent: deleting
    /// an unknown id is a no-op.
    pub async fn delete_item(&self, id: Uuid) -> CatalogResult<()> {
        let mut state = self.state.lock().await;
        let Some(index) = state.items.iter().position(|item| item.id == id) else {
            tracing::debug!("Ignoring delete of unknown item {}", id);
            return Ok(());
        };

        let removed = state.items.remove(index);
        for image_id in removed.images.iter().filter_map(ImageRef::image_id) {
            self.store.remove_transient(&original_key(image_id)).await;
        }
        tracing::info!(
            "Deleted catalog item {} ({} {})",
            removed.id,
            removed.brand,
            removed.model
        );

        self.persist_items_or_warn(&state.items).await;
        Ok(())
    }

    pub async fn get_item(&self, id: Uuid) -> CatalogResult<CatalogItem> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("catalog item", id.to_string()))
    }

    /// Pure read. Insertion order unless the query carries a sort override.
    pub async fn list_items(&self, query: &CatalogQuery) -> Vec<CatalogItem> {
        let state = self.state.lock().await;
        let mut items: Vec<CatalogItem> = state
            .items
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();

        if let Some(field) = query.sort_by {
            items.sort_by(|a, b| {
                let ordering = match field {
                    SortField::Price => a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal),
                    SortField::Year => a.year.cmp(&b.year),
                    SortField::Mileage => a.mileage.cmp(&b.mileage),
                    SortField::Brand => a.brand.to_lowercase().cmp(&b.brand.to_lowercase()),
                    SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                };
                match query.sort_order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        items
    }

    /// Reorder an item's images by index permutation. Membership never
    /// changes; a `new_order` that is not a permutation of the current
    /// indices is rejected without touching the item.
    pub async fn reorder_images(
        &self,
        item_id: Uuid,
        new_order: &[usize],
    ) -> CatalogResult<CatalogItem> {
        self.mutate_images(item_id, |images| {
            if new_order.len() != images.len() {
                return Err(CatalogError::invalid_input(format!(
                    "reorder expects {} indices, got {}",
                    images.len(),
                    new_order.len()
                )));
            }
            let mut seen = vec![false; images.len()];
            for &index in new_order {
                if index >= images.len() || seen[index] {
                    return Err(CatalogError::invalid_input(
                        "reorder indices must be a permutation of the image list",
                    ));
                }
                seen[index] = true;
            }
            let reordered: Vec<ImageRef> =
                new_order.iter().map(|&i| images[i].clone()).collect();
            *images = reordered;
            Ok(())
        })
        .await
    }

    pub async fn reverse_images(&self, item_id: Uuid) -> CatalogResult<CatalogItem> {
        self.mutate_images(item_id, |images| {
            images.reverse();
            Ok(())
        })
        .await
    }

    pub async fn shuffle_images(&self, item_id: Uuid) -> CatalogResult<CatalogItem> {
        self.mutate_images(item_id, |images| {
            fastrand::shuffle(images);
            Ok(())
        })
        .await
    }

    /// Current cover-photo list in display order.
    pub async fn cover_photos(&self) -> Vec<ImageRef> {
        self.state.lock().await.cover_photos.clone()
    }

    /// Run an upload through the thumbnail pipeline and append it to the
    /// cover-photo list under that list's own key and budget.
    pub async fn add_cover_photo(&self, raw: &[u8]) -> CatalogResult<ImageRef> {
        let mut state = self.state.lock().await;
        if state.cover_photos.len() >= self.limits.max_cover_photos {
            return Err(CatalogError::invalid_input("cover photo list is full"));
        }

        let thumbnail = self.thumbnails.generate(raw)?;
        let image_ref = ImageRef::Embedded { image: thumbnail };
        state.cover_photos.push(image_ref.clone());
        if let Err(e) = self.persist_cover_photos(&state.cover_photos).await {
            state.cover_photos.pop();
            return Err(e);
        }
        Ok(image_ref)
    }

    /// Append an external (unowned, quota-free) cover photo.
    pub async fn add_cover_photo_url(&self, url: String) -> CatalogResult<ImageRef> {
        let mut state = self.state.lock().await;
        if state.cover_photos.len() >= self.limits.max_cover_photos {
            return Err(CatalogError::invalid_input("cover photo list is full"));
        }

        let image_ref = ImageRef::External { url };
        state.cover_photos.push(image_ref.clone());
        if let Err(e) = self.persist_cover_photos(&state.cover_photos).await {
            state.cover_photos.pop();
            return Err(e);
        }
        Ok(image_ref)
    }

    /// Remove one cover photo by position. Out-of-range indices are a
    /// no-op, matching delete semantics.
    pub async fn remove_cover_photo(&self, index: usize) -> CatalogResult<()> {
        let mut state = self.state.lock().await;
        if index >= state.cover_photos.len() {
            return Ok(());
        }
        let removed = state.cover_photos.remove(index);
        if let Some(image_id) = removed.image_id() {
            self.store.remove_transient(&original_key(image_id)).await;
        }

        match serde_json::to_vec(&state.cover_photos) {
            Ok(bytes) => {
                if let Err(e) = self.store.set(COVER_PHOTOS_KEY, &bytes).await {
                    tracing::warn!(
                        "Cover photo persist failed; durable state is stale until the next successful write: {}",
                        e
                    );
                }
            }
            Err(e) => tracing::warn!("Cover photo serialization failed: {}", e),
        }
        Ok(())
    }

    /// Quota snapshot for the admin console.
    pub async fn storage_info(&self) -> CatalogResult<StorageInfo> {
        Ok(self.ledger.storage_info().await?)
    }

    /// High-water test feeding the console's eviction prompt.
    pub async fn eviction_recommended(&self) -> CatalogResult<bool> {
        Ok(self.policy.should_run(self.ledger.usage_fraction().await?))
    }

    /// Run one eviction strategy across every item, then persist the whole
    /// catalog once.
    pub async fn evict(&self, strategy: EvictionStrategy) -> CatalogResult<EvictionReport> {
        let mut state = self.state.lock().await;
        let before = self.store.value_len(ITEMS_KEY).await?;

        let (mut report, dropped_ids) = self.policy.apply(strategy, &mut state.items);
        for image_id in &dropped_ids {
            self.store.remove_transient(&original_key(*image_id)).await;
        }

        self.persist_items(&state.items).await?;
        let after = self.store.value_len(ITEMS_KEY).await?;
        report.bytes_reclaimed = before.saturating_sub(after);

        tracing::info!(
            "Eviction complete: {} item(s) trimmed, {} image(s) removed, {} bytes reclaimed",
            report.items_trimmed,
            report.images_removed,
            report.bytes_reclaimed
        );
        Ok(report)
    }

    /// Full-resolution copy of an upload, if the session still holds one.
    pub async fn original_upload(&self, image_id: Uuid) -> Option<Vec<u8>> {
        self.store.get_transient(&original_key(image_id)).await
    }

    /// Drop all session-scoped data (retained originals). Durable state is
    /// untouched.
    pub async fn clear_session(&self) {
        self.store.clear_session().await;
    }

    /// Walk uploads through compression and per-image quota admission.
    ///
    /// `replace_index` selects update semantics: the candidate replaces the
    /// item at that position when projecting the serialized catalog, instead
    /// of being appended. The projected size is measured by serializing the
    /// real prospective list, never estimated analytically.
    async fn admit_images(
        &self,
        items: &[CatalogItem],
        candidate: &CatalogItem,
        replace_index: Option<usize>,
        raw_images: &[Vec<u8>],
        slots: usize,
    ) -> CatalogResult<Admission> {
        let mut admission = Admission::default();
        let mut working = candidate.clone();

        // The textual record must fit on its own before any image is
        // considered, so an over-quota state can never persist.
        let baseline = projected_len(items, &working, replace_index)?;
        if !self.ledger.can_admit(ITEMS_KEY, baseline as u64).await? {
            let available = self.ledger.available_for(ITEMS_KEY).await?;
            return Err(CatalogError::quota_exceeded(baseline as u64, available));
        }

        for raw in raw_images {
            if admission.accepted.len() >= slots {
                break;
            }

            let compressed = match self.codec.compress(raw) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("Skipping upload that failed compression: {}", e);
                    continue;
                }
            };
            admission.compressible += 1;

            working.images.push(ImageRef::Embedded {
                image: compressed.clone(),
            });
            let projected = projected_len(items, &working, replace_index)?;
            if !self.ledger.can_admit(ITEMS_KEY, projected as u64).await? {
                working.images.pop();
                admission.quota_stopped = true;
                admission.refused_projected = projected as u64;
                tracing::warn!(
                    "Quota refused image {} ({} bytes projected); truncating remaining uploads",
                    compressed.id,
                    projected
                );
                break;
            }

            if self.limits.retain_originals {
                admission.originals.push((compressed.id, raw.clone()));
            }
            admission.accepted.push(compressed);
        }

        Ok(admission)
    }

    /// Rejection rule shared by add and update: uploads were supplied, at
    /// least one was compressible, and the quota admitted none of them.
    async fn check_rejection(&self, admission: &Admission) -> CatalogResult<()> {
        if admission.quota_stopped && admission.accepted.is_empty() && admission.compressible > 0 {
            let available = self.ledger.available_for(ITEMS_KEY).await?;
            let used = self.ledger.used_bytes().await?;
            tracing::warn!(
                "Mutation rejected: no image admissible, {} of {} bytes used",
                used,
                self.ledger.capacity_bytes()
            );
            return Err(CatalogError::quota_exceeded(
                admission.refused_projected,
                available,
            ));
        }
        Ok(())
    }

    async fn retain_originals(&self, originals: Vec<(Uuid, Vec<u8>)>) {
        for (image_id, blob) in originals {
            self.store
                .set_transient(&original_key(image_id), blob)
                .await;
        }
    }

    async fn mutate_images<F>(&self, item_id: Uuid, mutate: F) -> CatalogResult<CatalogItem>
    where
        F: FnOnce(&mut Vec<ImageRef>) -> CatalogResult<()>,
    {
        let mut state = self.state.lock().await;
        let index = state
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| CatalogError::not_found("catalog item", item_id.to_string()))?;

        mutate(&mut state.items[index].images)?;
        state.items[index].updated_at = Utc::now();

        self.persist_items_or_warn(&state.items).await;
        Ok(state.items[index].clone())
    }

    async fn persist_items(&self, items: &[CatalogItem]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(items)?;
        self.store.set(ITEMS_KEY, &bytes).await
    }

    /// Persist after a shrinking or size-neutral mutation. Failure here is
    /// tolerated: the in-memory catalog stays usable and durable state is
    /// stale until the next successful write.
    async fn persist_items_or_warn(&self, items: &[CatalogItem]) {
        if let Err(e) = self.persist_items(items).await {
            tracing::warn!(
                "Catalog persist failed; durable state is stale until the next successful write: {}",
                e
            );
        }
    }

    async fn persist_cover_photos(&self, cover_photos: &[ImageRef]) -> CatalogResult<()> {
        let bytes = serde_json::to_vec(cover_photos).map_err(StoreError::from)?;
        if !self
            .ledger
            .can_admit(COVER_PHOTOS_KEY, bytes.len() as u64)
            .await?
        {
            let available = self.ledger.available_for(COVER_PHOTOS_KEY).await?;
            return Err(CatalogError::quota_exceeded(bytes.len() as u64, available));
        }
        self.store
            .set(COVER_PHOTOS_KEY, &bytes)
            .await
            .map_err(|e| CatalogError::storage_exhausted(e.to_string()))
    }
}

/// Serialized length of the catalog as it would exist after the mutation.
fn projected_len(
    items: &[CatalogItem],
    candidate: &CatalogItem,
    replace_index: Option<usize>,
) -> CatalogResult<usize> {
    let mut prospective: Vec<&CatalogItem> = items.iter().collect();
    match replace_index {
        Some(index) => prospective[index] = candidate,
        None => prospective.push(candidate),
    }
    let bytes = serde_json::to_vec(&prospective).map_err(StoreError::from)?;
    Ok(bytes.len())
}
