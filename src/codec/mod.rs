//! Image compression pipeline
//!
//! Turns arbitrary uploaded image blobs into size-bounded JPEG payloads by
//! walking the encode quality down until the persisted cost fits the byte
//! budget. Best-effort: oversized input that cannot reach the budget still
//! yields the floor-quality encoding, flagged via `within_budget`.

pub mod thumbnail;

pub use thumbnail::ThumbnailGenerator;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::io::Cursor;
use uuid::Uuid;

use crate::config::CompressionConfig;
use crate::errors::CodecError;
use crate::models::CompressedImage;

const JPEG_MIME: &str = "image/jpeg";

#[derive(Clone)]
pub struct BinaryCodec {
    config: CompressionConfig,
}

impl BinaryCodec {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    /// Compress against the configured per-image ceiling.
    pub fn compress(&self, blob: &[u8]) -> Result<CompressedImage, CodecError> {
        self.compress_to(blob, self.config.max_image_bytes)
    }

    /// Compress against an explicit byte budget.
    ///
    /// Never fails for valid non-empty decodable input: when the budget is
    /// unreachable the floor-quality attempt is returned with
    /// `within_budget = false`.
    pub fn compress_to(&self, blob: &[u8], max_bytes: usize) -> Result<CompressedImage, CodecError> {
        if blob.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        let decoded = image::load_from_memory(blob)?;
        let (src_width, src_height) = decoded.dimensions();

        let raster = scale_down(decoded, self.config.max_dimension);
        let (width, height) = (raster.width(), raster.height());

        tracing::debug!(
            "Compressing image: {}x{} -> {}x{}, input {} bytes, budget {} bytes",
            src_width,
            src_height,
            width,
            height,
            blob.len(),
            max_bytes
        );

        let mut quality = self.config.start_quality;
        let mut data = encode_jpeg(&raster, quality)?;
        let mut estimate = estimate_stored_cost(data.len(), self.config.encoding_overhead);

        while estimate > max_bytes && quality > self.config.quality_floor + 1e-3 {
            quality = (quality - self.config.quality_step).max(self.config.quality_floor);
            data = encode_jpeg(&raster, quality)?;
            estimate = estimate_stored_cost(data.len(), self.config.encoding_overhead);
        }

        let within_budget = estimate <= max_bytes;
        if !within_budget {
            tracing::warn!(
                "Image budget unreachable: {} bytes estimated at floor quality {:.1}, budget {}",
                estimate,
                quality,
                max_bytes
            );
        }

        Ok(CompressedImage {
            id: Uuid::new_v4(),
            data,
            mime_type: JPEG_MIME.to_string(),
            width,
            height,
            quality,
            within_budget,
        })
    }
}

/// Downscale so the longer dimension fits `max_dimension`, preserving aspect
/// ratio. Smaller rasters pass through untouched.
pub(crate) fn scale_down(image: DynamicImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    // JPEG carries no alpha channel, so flatten to RGB before encoding.
    if width.max(height) <= max_dimension {
        image.to_rgb8()
    } else {
        image
            .resize(max_dimension, max_dimension, FilterType::Triangle)
            .to_rgb8()
    }
}

/// Encode a raster as JPEG at the given 0.0..=1.0 quality.
pub(crate) fn encode_jpeg(raster: &RgbImage, quality: f32) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    let clamped = (quality.clamp(0.0, 1.0) * 100.0).round() as u8;
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, clamped);
    encoder
        .encode_image(raster)
        .map_err(|e| CodecError::encode(e.to_string()))?;
    Ok(out)
}

/// Persisted byte cost of a payload: the serialized form is base64 text, so
/// the stored length is the inflated length scaled by the overhead factor.
pub fn estimate_stored_cost(payload_len: usize, encoding_overhead: f32) -> usize {
    let base64_len = payload_len.div_ceil(3) * 4;
    (base64_len as f32 * encoding_overhead).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use image::ImageFormat;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let raster = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(raster)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn codec() -> BinaryCodec {
        BinaryCodec::new(Config::default().compression)
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            codec().compress(&[]),
            Err(CodecError::EmptyInput)
        ));
    }

    #[test]
    fn test_garbage_input_is_a_decode_error() {
        let garbage = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03];
        assert!(matches!(
            codec().compress(&garbage),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_large_raster_is_scaled_to_max_dimension() {
        let compressed = codec().compress(&png_bytes(1600, 1200)).unwrap();
        assert_eq!(compressed.width, 800);
        assert!(compressed.height <= 800);
        assert_eq!(compressed.mime_type, "image/jpeg");
    }

    #[test]
    fn test_small_raster_is_never_upscaled() {
        let compressed = codec().compress(&png_bytes(120, 90)).unwrap();
        assert_eq!(compressed.width, 120);
        assert_eq!(compressed.height, 90);
    }

    #[test]
    fn test_result_honors_budget_or_reaches_floor() {
        let cfg = Config::default().compression;
        let blob = png_bytes(1024, 768);

        let roomy = codec().compress_to(&blob, 500 * 1024).unwrap();
        assert!(roomy.within_budget);
        assert!(estimate_stored_cost(roomy.data.len(), cfg.encoding_overhead) <= 500 * 1024);

        // One byte is unreachable for any raster; the codec must still
        // return the floor-quality attempt instead of failing.
        let floored = codec().compress_to(&blob, 1).unwrap();
        assert!(!floored.within_budget);
        assert!((floored.quality - cfg.quality_floor).abs() < 1e-3);
        assert!(!floored.data.is_empty());
    }

    #[test]
    fn test_quality_walks_down_for_tight_budgets() {
        let blob = png_bytes(800, 600);
        let cfg = Config::default().compression;

        let generous = codec().compress_to(&blob, 4 * 1024 * 1024).unwrap();
        assert!((generous.quality - cfg.start_quality).abs() < 1e-3);

        let tight_budget = generous.data.len() / 4;
        let tight = codec().compress_to(&blob, tight_budget).unwrap();
        assert!(tight.quality < generous.quality);
    }

    #[test]
    fn test_stored_cost_estimate_tracks_base64_inflation() {
        // 3 raw bytes -> 4 base64 chars -> 3 estimated at 0.75 overhead
        assert_eq!(estimate_stored_cost(3, 0.75), 3);
        assert_eq!(estimate_stored_cost(300, 0.75), 300);
        // padding rounds the inflated length up
        assert_eq!(estimate_stored_cost(4, 0.75), 6);
    }
}
