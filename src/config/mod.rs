use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    pub compression: CompressionConfig,
    pub thumbnail: ThumbnailConfig,
    pub catalog: CatalogLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the durable namespace
    pub data_dir: PathBuf,
    /// Hard ceiling of the storage medium itself, independent of the
    /// logical quota. Writes past this fail at the store level.
    pub hard_limit_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Logical byte ceiling for the durable store's total serialized size
    pub capacity_bytes: u64,
    /// Usage fraction past which eviction is recommended
    pub eviction_threshold: f64,
    /// Per-item image cap applied by the default eviction strategy
    pub eviction_image_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Longest raster dimension after downscaling; never upscaled
    pub max_dimension: u32,
    /// First JPEG encode quality (0.0..=1.0)
    pub start_quality: f32,
    /// Lowest quality the search will reach
    pub quality_floor: f32,
    /// Quality decrement per re-encode
    pub quality_step: f32,
    /// Per-image persisted byte ceiling
    pub max_image_bytes: usize,
    /// Factor mapping base64-inflated length back to payload cost
    pub encoding_overhead: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Longest thumbnail dimension
    pub dimension: u32,
    /// Single fixed encode quality, no iterative search
    pub quality: f32,
    /// Byte budget recorded on the produced preview
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLimits {
    /// Maximum image references per catalog item
    pub max_images_per_item: usize,
    /// Maximum entries in the cover-photo list
    pub max_cover_photos: usize,
    /// Keep one full-resolution copy of each upload in the transient
    /// namespace for the session
    pub retain_originals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("./data/catalog"),
                hard_limit_bytes: 5 * 1024 * 1024,
            },
            quota: QuotaConfig {
                capacity_bytes: 4 * 1024 * 1024,
                eviction_threshold: 0.8,
                eviction_image_cap: 3,
            },
            compression: CompressionConfig {
                max_dimension: 800,
                start_quality: 0.9,
                quality_floor: 0.1,
                quality_step: 0.1,
                max_image_bytes: 500 * 1024,
                encoding_overhead: 0.75,
            },
            thumbnail: ThumbnailConfig {
                dimension: 200,
                quality: 0.6,
                max_bytes: 100 * 1024,
            },
            catalog: CatalogLimits {
                max_images_per_item: 10,
                max_cover_photos: 8,
                retain_originals: true,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::create_dir_all(&default_config.storage.data_dir)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}
