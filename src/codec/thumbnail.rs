use uuid::Uuid;

use crate::config::ThumbnailConfig;
use crate::errors::CodecError;
use crate::models::CompressedImage;

use super::{encode_jpeg, estimate_stored_cost, scale_down};

/// Produces small fixed-dimension previews for the cover-photo grid.
///
/// Same scale/encode strategy as [`super::BinaryCodec`] but with one fixed
/// quality — previews must be cheap, so there is no iterative search.
#[derive(Clone)]
pub struct ThumbnailGenerator {
    config: ThumbnailConfig,
}

impl ThumbnailGenerator {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, blob: &[u8]) -> Result<CompressedImage, CodecError> {
        if blob.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        let decoded = image::load_from_memory(blob)?;
        let raster = scale_down(decoded, self.config.dimension);
        let data = encode_jpeg(&raster, self.config.quality)?;
        let estimate = estimate_stored_cost(data.len(), 0.75);

        Ok(CompressedImage {
            id: Uuid::new_v4(),
            width: raster.width(),
            height: raster.height(),
            mime_type: "image/jpeg".to_string(),
            quality: self.config.quality,
            within_budget: estimate <= self.config.max_bytes,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let raster = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(raster)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn generator() -> ThumbnailGenerator {
        ThumbnailGenerator::new(Config::default().thumbnail)
    }

    #[test]
    fn test_thumbnail_fits_target_dimension() {
        let thumb = generator().generate(&png_bytes(1600, 900)).unwrap();
        assert_eq!(thumb.width, 200);
        assert!(thumb.height <= 200);
        assert!(thumb.within_budget);
    }

    #[test]
    fn test_thumbnail_quality_is_fixed() {
        let config = Config::default().thumbnail;
        let thumb = generator().generate(&png_bytes(640, 480)).unwrap();
        assert!((thumb.quality - config.quality).abs() < 1e-3);
    }

    #[test]
    fn test_thumbnail_rejects_empty_input() {
        assert!(matches!(
            generator().generate(&[]),
            Err(CodecError::EmptyInput)
        ));
    }
}
