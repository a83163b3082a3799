//! Low-quality image placeholder (LQIP) generation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::config::PlaceholderConfig;
use crate::error::PipelineError;

use super::decode::ImageDecoder;

/// Generates a tiny inline JPEG preview.
pub struct PlaceholderGenerator {
    config: PlaceholderConfig,
}

impl PlaceholderGenerator {
    /// Create a new placeholder generator with the given configuration.
    pub fn new(config: PlaceholderConfig) -> Self {
        Self { config }
    }

    /// Build a `data:image/jpeg;base64,...` URI from the raw upload.
    ///
    /// Works on the original bytes, not the enhanced image, so it is
    /// independent of the enhancement stages. Never enlarges.
    pub fn generate(&self, data: &[u8]) -> Result<String, PipelineError> {
        let bytes = self.generate_bytes(data)?;
        Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)))
    }

    /// Generate the placeholder and return the raw JPEG bytes.
    pub fn generate_bytes(&self, data: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let decoded = ImageDecoder::decode_sync(data)?;
        let image = decoded.image;

        let width = self.config.width.min(image.width()).max(1);
        let height = ((u64::from(image.height()) * u64::from(width)) as f64
            / f64::from(image.width().max(1)))
        .round()
        .max(1.0) as u32;
        let small = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.config.quality.clamp(1, 100))
            .encode_image(&small)
            .map_err(|e| PipelineError::Encode {
                variant: "placeholder".to_string(),
                message: e.to_string(),
            })?;
        Ok(buffer)
    }
}
