//! Image decoding with format detection and timeout support.

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageDecoder as _, ImageFormat, ImageReader};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data (first frame for animations)
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Embedded ICC profile, if any
    pub icc_profile: Option<Vec<u8>>,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode the raw buffer on the blocking pool, bounded by the decode timeout.
    ///
    /// Animated inputs yield their first frame.
    pub async fn decode(&self, bytes: Bytes) -> Result<DecodedImage, PipelineError> {
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::decode_sync(&bytes)),
        )
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Unknown(format!("Decode task failed: {}", e))),
            Err(_) => Err(PipelineError::Timeout {
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes.
    pub fn decode_sync(bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::InvalidImage {
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = reader.format().ok_or_else(|| PipelineError::InvalidImage {
            message: "Unrecognized image format".to_string(),
        })?;
        let mut decoder = reader.into_decoder().map_err(|e| PipelineError::InvalidImage {
            message: e.to_string(),
        })?;
        let icc_profile = decoder.icc_profile().ok().flatten().filter(|icc| !icc.is_empty());
        let image = DynamicImage::from_decoder(decoder).map_err(|e| PipelineError::InvalidImage {
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            icc_profile,
        })
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}
