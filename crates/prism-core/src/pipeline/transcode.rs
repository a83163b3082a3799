//! Resize, sharpen and encode a single variant.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Pixel};
use std::time::Instant;

use crate::config::{Config, SharpenConfig};
use crate::error::PipelineError;
use crate::types::{ImageMetadata, VariantResult, VariantSpec};

use super::encode::VariantEncoder;
use super::enhance::EnhancedImage;

/// Produces one [`VariantResult`] per [`VariantSpec`] from the shared
/// enhanced image. Stateless and safe to call from many blocking tasks.
#[derive(Debug, Clone)]
pub struct VariantTranscoder {
    sharpen: SharpenConfig,
    encoder: VariantEncoder,
}

impl VariantTranscoder {
    pub fn new(config: &Config) -> Self {
        Self {
            sharpen: config.sharpen.clone(),
            encoder: VariantEncoder::new(config.quality.clone()),
        }
    }

    /// Cut one variant. CPU-bound; run it on the blocking pool.
    pub fn transcode(
        &self,
        enhanced: &EnhancedImage,
        spec: &VariantSpec,
        original: &ImageMetadata,
    ) -> Result<VariantResult, PipelineError> {
        let start = Instant::now();

        let (width, height) =
            target_dimensions(enhanced.width(), enhanced.height(), spec.target_width);
        let resized = if (width, height) == (enhanced.width(), enhanced.height()) {
            enhanced.image().clone()
        } else {
            enhanced.image().resize_exact(width, height, FilterType::Lanczos3)
        };

        let amount = sharpen_amount(&self.sharpen, original.oriented_width(), spec.target_width);
        let sharpened = unsharp_mask(resized, self.sharpen.radius, amount, self.sharpen.threshold);

        let bytes = self.encoder.encode(&sharpened, spec, enhanced.icc_profile())?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::trace!(
            variant = %spec.key(),
            width,
            height,
            bytes = bytes.len(),
            elapsed_ms,
            "Encoded variant"
        );

        Ok(VariantResult {
            spec: *spec,
            byte_size: bytes.len() as u64,
            bytes,
            width,
            height,
            format: spec.format,
            elapsed_ms,
        })
    }
}

/// Output size for a target width: never wider than the source, height
/// follows the aspect ratio and is at least 1.
pub fn target_dimensions(src_width: u32, src_height: u32, target_width: u32) -> (u32, u32) {
    let width = target_width.min(src_width).max(1);
    let height = (f64::from(src_height) * f64::from(width) / f64::from(src_width.max(1)))
        .round()
        .max(1.0) as u32;
    (width, height)
}

/// Sharpening grows with the downscale ratio, capped at `max_scale`.
pub fn sharpen_amount(config: &SharpenConfig, original_width: u32, target_width: u32) -> f32 {
    let scale = original_width as f32 / target_width.max(1) as f32;
    config.amount_base * scale.min(config.max_scale)
}

/// Unsharp mask on color channels; alpha is left untouched.
///
/// Differences smaller than `threshold` are ignored so flat areas and
/// noise are not amplified.
pub fn unsharp_mask(image: DynamicImage, sigma: f32, amount: f32, threshold: u8) -> DynamicImage {
    if amount <= 0.0 || sigma <= 0.0 {
        return image;
    }
    match image {
        DynamicImage::ImageRgba8(img) => {
            DynamicImage::ImageRgba8(sharpen_buffer(&img, sigma, amount, threshold))
        }
        DynamicImage::ImageRgb8(img) => {
            DynamicImage::ImageRgb8(sharpen_buffer(&img, sigma, amount, threshold))
        }
        other if other.color().has_alpha() => {
            DynamicImage::ImageRgba8(sharpen_buffer(&other.to_rgba8(), sigma, amount, threshold))
        }
        other => {
            DynamicImage::ImageRgb8(sharpen_buffer(&other.to_rgb8(), sigma, amount, threshold))
        }
    }
}

fn sharpen_buffer<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    sigma: f32,
    amount: f32,
    threshold: u8,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let blurred = imageops::blur(img, sigma);
    let channels = usize::from(P::CHANNEL_COUNT);
    let color_channels = match channels {
        2 | 4 => channels - 1,
        n => n,
    };
    let threshold = f32::from(threshold);

    let mut out = img.clone();
    for (i, (value, blur)) in out.iter_mut().zip(blurred.as_raw()).enumerate() {
        if i % channels >= color_channels {
            continue;
        }
        let diff = f32::from(*value) - f32::from(*blur);
        if diff.abs() < threshold {
            continue;
        }
        *value = (f32::from(*value) + amount * diff).round().clamp(0.0, 255.0) as u8;
    }
    out
}
