//! Bulk image eviction to restore quota headroom
//!
//! Strategies run over every item in one pass; the repository persists the
//! trimmed catalog exactly once afterwards so a large catalog is not
//! rewritten per item.

use uuid::Uuid;

use crate::models::{CatalogItem, EvictionReport, ImageRef};

/// Admin-invocable eviction strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStrategy {
    /// Cap every item's image list, discarding from the tail
    CapImages { max_per_item: usize },
    /// Remove embedded references whose payload is empty or not a
    /// recognizable image
    PurgeInvalid,
}

#[derive(Clone)]
pub struct EvictionPolicy {
    threshold: f64,
}

impl EvictionPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// High-water test: eviction is recommended past this usage fraction.
    pub fn should_run(&self, usage_fraction: f64) -> bool {
        usage_fraction > self.threshold
    }

    /// Apply a strategy across all items in place.
    ///
    /// Returns the report plus the ids of every embedded payload that was
    /// dropped, so the caller can release transient originals.
    pub fn apply(
        &self,
        strategy: EvictionStrategy,
        items: &mut [CatalogItem],
    ) -> (EvictionReport, Vec<Uuid>) {
        let mut report = EvictionReport::default();
        let mut dropped_ids = Vec::new();

        for item in items.iter_mut() {
            let before = item.images.len();

            match strategy {
                EvictionStrategy::CapImages { max_per_item } => {
                    for removed in item.images.drain(max_per_item.min(before)..) {
                        if let Some(id) = removed.image_id() {
                            dropped_ids.push(id);
                        }
                    }
                }
                EvictionStrategy::PurgeInvalid => {
                    item.images.retain(|image_ref| {
                        if image_ref_is_valid(image_ref) {
                            true
                        } else {
                            if let Some(id) = image_ref.image_id() {
                                dropped_ids.push(id);
                            }
                            false
                        }
                    });
                }
            }

            let removed = before - item.images.len();
            if removed > 0 {
                report.items_trimmed += 1;
                report.images_removed += removed;
                tracing::debug!(
                    "Evicted {} image(s) from item {} ({} {})",
                    removed,
                    item.id,
                    item.brand,
                    item.model
                );
            }
        }

        (report, dropped_ids)
    }
}

/// External references are always kept; embedded payloads must be non-empty
/// and carry a recognizable image signature.
fn image_ref_is_valid(image_ref: &ImageRef) -> bool {
    match image_ref {
        ImageRef::External { .. } => true,
        ImageRef::Embedded { image } => {
            !image.data.is_empty() && image::guess_format(&image.data).is_ok()
        }
    }
}
