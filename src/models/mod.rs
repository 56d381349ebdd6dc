use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One sellable unit: a motorcycle listing with attributes and an ordered
/// image sequence. The first image is the cover image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub category: BikeCategory,
    pub condition: Condition,
    pub mileage: u32,
    pub description: String,
    pub features: Vec<String>,
    pub images: Vec<ImageRef>,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Build a fresh item from an admin draft. Images are attached by the
    /// repository after compression and quota admission.
    pub fn from_draft(draft: ItemDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            brand: draft.brand,
            model: draft.model,
            year: draft.year,
            price: draft.price,
            category: draft.category,
            condition: draft.condition,
            mileage: draft.mileage,
            description: draft.description,
            features: draft.features,
            images: Vec::new(),
            featured: draft.featured,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Only fields present in the patch change.
    pub fn apply_patch(&mut self, patch: ItemPatch) {
        if let Some(brand) = patch.brand {
            self.brand = brand;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(condition) = patch.condition {
            self.condition = condition;
        }
        if let Some(mileage) = patch.mileage {
            self.mileage = mileage;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(features) = patch.features {
            self.features = features;
        }
        if let Some(featured) = patch.featured {
            self.featured = featured;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeCategory {
    Sport,
    Cruiser,
    Touring,
    Adventure,
    Naked,
    Offroad,
    Scooter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

/// A reference to one listing image
///
/// External URLs are not owned and carry no storage cost. Embedded payloads
/// are owned by exactly the item holding them and count against the quota
/// while persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageRef {
    External { url: String },
    Embedded { image: CompressedImage },
}

impl ImageRef {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    /// Id of the embedded payload, if any
    pub fn image_id(&self) -> Option<Uuid> {
        match self {
            Self::Embedded { image } => Some(image.id),
            Self::External { .. } => None,
        }
    }

    /// Raw payload size in bytes; zero for external references
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Embedded { image } => image.data.len(),
            Self::External { .. } => 0,
        }
    }
}

/// Self-describing compressed image payload produced by the codec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedImage {
    pub id: Uuid,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Final encode quality in the 0.0..=1.0 range
    pub quality: f32,
    /// Whether the byte budget was honored; false means the quality floor
    /// was reached on oversized input and this is the best-effort result
    pub within_budget: bool,
}

/// Base64 (de)serialization for embedded payload bytes. The persisted form
/// is JSON, so raw bytes must travel as text.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Fields supplied by the admin console when creating an item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub category: BikeCategory,
    pub condition: Condition,
    pub mileage: u32,
    pub description: String,
    pub features: Vec<String>,
    pub featured: bool,
}

impl Default for BikeCategory {
    fn default() -> Self {
        Self::Sport
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::Used
    }
}

/// Partial update for an existing item; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
    pub category: Option<BikeCategory>,
    pub condition: Option<Condition>,
    pub mileage: Option<u32>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub featured: Option<bool>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.condition.is_none()
            && self.mileage.is_none()
            && self.description.is_none()
            && self.features.is_none()
            && self.featured.is_none()
    }
}

/// Listing query parameters
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Filter by brand (case-insensitive exact match)
    pub brand: Option<String>,
    /// Filter by category
    pub category: Option<BikeCategory>,
    /// Filter by condition
    pub condition: Option<Condition>,
    /// Inclusive lower price bound
    pub min_price: Option<f64>,
    /// Inclusive upper price bound
    pub max_price: Option<f64>,
    /// Filter by featured flag
    pub featured: Option<bool>,
    /// Sort field; insertion order when absent
    pub sort_by: Option<SortField>,
    /// Sort direction, descending by default when a sort field is set
    pub sort_order: SortOrder,
}

impl CatalogQuery {
    /// Create new empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by brand
    pub fn brand<S: Into<String>>(mut self, brand: S) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Filter by category
    pub fn category(mut self, category: BikeCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Filter by condition
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Filter by inclusive price range
    pub fn price_range(mut self, min: f64, max: f64) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    /// Filter by featured flag
    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    /// Override insertion ordering
    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_by = Some(field);
        self.sort_order = order;
        self
    }

    /// Whether an item passes every predicate in this query
    pub fn matches(&self, item: &CatalogItem) -> bool {
        if let Some(brand) = &self.brand {
            if !item.brand.eq_ignore_ascii_case(brand) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if item.category != category {
                return false;
            }
        }
        if let Some(condition) = self.condition {
            if item.condition != condition {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if item.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if item.price > max {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if item.featured != featured {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Price,
    Year,
    Mileage,
    Brand,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Descending
    }
}

/// How a mutating call terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOutcome {
    /// Normal terminal state: full payload persisted
    Committed,
    /// Persisted, but the mutation's image payload was dropped
    Degraded,
}

/// Result of a successful add/update mutation
///
/// A rejected mutation surfaces as an error instead; a receipt always means
/// the textual record was persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationReceipt {
    pub item: CatalogItem,
    pub outcome: CommitOutcome,
    /// Images admitted and persisted by this mutation
    pub images_accepted: usize,
    /// Images silently dropped (quota truncation, skipped decode failures,
    /// or a degraded commit)
    pub images_dropped: usize,
}

/// Quota status snapshot for the admin console
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageInfo {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
}

impl StorageInfo {
    pub fn usage_fraction(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.capacity_bytes as f64
    }
}

/// Outcome summary of one eviction pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvictionReport {
    /// Items that lost at least one image
    pub items_trimmed: usize,
    /// Total image references removed
    pub images_removed: usize,
    /// Serialized bytes reclaimed by the re-persist
    pub bytes_reclaimed: u64,
}
