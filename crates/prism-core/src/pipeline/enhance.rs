//! One-pass enhancement applied before any variant is cut.
//!
//! Stages run in a fixed order, each a plain `DynamicImage -> DynamicImage`
//! function gated by configuration:
//!
//! ```text
//! orient → canonical color space → tone curve → color → denoise
//! ```
//!
//! The result is wrapped in an [`EnhancedImage`] that every variant shares
//! read-only, so the cost of this module is paid once per upload.

use bytes::Bytes;
use image::{imageops, DynamicImage, Rgb, RgbImage, Rgba};
use std::sync::Arc;

use crate::config::Config;
use crate::error::PipelineError;
use crate::types::ImageMetadata;

use super::decode::ImageDecoder;

/// Decoded, enhanced image shared by all variant transcodes.
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    image: Arc<DynamicImage>,
    icc_profile: Option<Bytes>,
}

impl EnhancedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            icc_profile: None,
        }
    }

    /// Keep the source ICC profile so encoders can re-attach it.
    pub fn with_icc_profile(mut self, icc_profile: Option<Vec<u8>>) -> Self {
        self.icc_profile = icc_profile.map(Bytes::from);
        self
    }

    /// Cheap handle for one more consumer; no pixels are copied.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Runs the enhancement stages.
pub struct Enhancer {
    config: Config,
    decoder: ImageDecoder,
}

impl Enhancer {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            decoder: ImageDecoder::new(config.limits.clone()),
        }
    }

    /// Decode the raw upload once and run every enabled stage on it.
    pub async fn enhance(
        &self,
        bytes: Bytes,
        metadata: &ImageMetadata,
    ) -> Result<EnhancedImage, PipelineError> {
        let decoded = self.decoder.decode(bytes).await?;
        let config = self.config.clone();
        let orientation = metadata.orientation;
        let icc_profile = if config.processing.strip_metadata {
            None
        } else {
            decoded.icc_profile
        };

        let source = decoded.image;
        let enhanced = tokio::task::spawn_blocking(move || {
            apply_stages(source, orientation, &config)
        })
        .await
        .map_err(|e| PipelineError::Unknown(format!("Enhancement task failed: {}", e)))?;

        Ok(EnhancedImage::new(enhanced).with_icc_profile(icc_profile))
    }
}

/// Apply the fixed stage sequence to a decoded image.
pub fn apply_stages(image: DynamicImage, orientation: Option<u32>, config: &Config) -> DynamicImage {
    let mut image = image;

    if config.processing.auto_rotate {
        if let Some(o) = orientation {
            image = orient(image, o);
        }
    }

    image = to_canonical_color_space(image);

    if config.tone.filmic {
        image = tone_curve(
            image,
            config.tone.shadow_lift,
            config.tone.highlight_protect,
            1.0 + config.tone.mid_contrast,
        );
    }

    let saturation = (1.0 + config.tone.vibrance + config.tone.dehaze) * config.tone.saturation;
    image = saturate(image, saturation);

    let denoise = &config.denoise;
    if denoise.chroma > denoise.threshold || denoise.luma > denoise.threshold {
        image = median_denoise(image);
    }

    image
}

/// Rotation and flips for an EXIF orientation value.
///
/// Returns (clockwise rotation, flip horizontal, flip vertical), rotation first.
pub fn orientation_transforms(orientation: u32) -> (Option<u16>, bool, bool) {
    match orientation {
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(90), true, false),
        6 => (Some(90), false, false),
        7 => (Some(270), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    }
}

/// Bake an EXIF orientation into the pixel data.
pub fn orient(image: DynamicImage, orientation: u32) -> DynamicImage {
    let (rotate, flip_h, flip_v) = orientation_transforms(orientation);
    tracing::trace!(orientation, ?rotate, flip_h, flip_v, "Applying EXIF orientation");

    let mut image = match rotate {
        Some(90) => image.rotate90(),
        Some(180) => image.rotate180(),
        Some(270) => image.rotate270(),
        _ => image,
    };
    if flip_h {
        image = image.fliph();
    }
    if flip_v {
        image = image.flipv();
    }
    image
}

/// 8-bit sRGB, keeping an alpha channel only if the source has one.
pub fn to_canonical_color_space(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Stretch the tonal range between two luma percentiles, then bend midtones.
///
/// `shadow_lift` and `highlight_protect` are the fractions of pixels that may
/// clip at each end. `gamma > 1` darkens midtones slightly, which restores
/// contrast after the stretch.
pub fn tone_curve(
    image: DynamicImage,
    shadow_lift: f32,
    highlight_protect: f32,
    gamma: f32,
) -> DynamicImage {
    let histogram = luma_histogram(&image);
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return image;
    }

    let lo = percentile(&histogram, total, shadow_lift);
    let hi = percentile(&histogram, total, 1.0 - highlight_protect);
    let (lo, hi) = if hi > lo { (lo, hi) } else { (0, 255) };

    let range = f32::from(hi - lo);
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let stretched = ((v as f32 - f32::from(lo)) / range).clamp(0.0, 1.0);
        *slot = (stretched.powf(gamma) * 255.0).round() as u8;
    }

    map_rgb(image, |[r, g, b]| {
        [lut[r as usize], lut[g as usize], lut[b as usize]]
    })
}

/// Scale chroma around Rec.709 luma by `factor`.
pub fn saturate(image: DynamicImage, factor: f32) -> DynamicImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image;
    }
    map_rgb(image, |[r, g, b]| {
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let adjust = |c: f32| (luma + (c - luma) * factor).round().clamp(0.0, 255.0) as u8;
        [adjust(r), adjust(g), adjust(b)]
    })
}

/// 3x3 median filter. Conservative on purpose: product shots lose texture fast.
pub fn median_denoise(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgba8(img) => {
            DynamicImage::ImageRgba8(imageproc::filter::median_filter(&img, 1, 1))
        }
        other => DynamicImage::ImageRgb8(imageproc::filter::median_filter(&other.to_rgb8(), 1, 1)),
    }
}

fn luma_histogram(image: &DynamicImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    let gray = imageops::grayscale(image);
    for p in gray.pixels() {
        histogram[p.0[0] as usize] += 1;
    }
    histogram
}

fn percentile(histogram: &[u64; 256], total: u64, fraction: f32) -> u8 {
    let target = (total as f64 * f64::from(fraction.clamp(0.0, 1.0))).ceil() as u64;
    let mut cumulative = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target.max(1) {
            return value as u8;
        }
    }
    255
}

/// Apply a per-pixel RGB mapping, leaving alpha untouched.
fn map_rgb<F>(image: DynamicImage, f: F) -> DynamicImage
where
    F: Fn([u8; 3]) -> [u8; 3],
{
    match image {
        DynamicImage::ImageRgba8(mut img) => {
            for Rgba([r, g, b, _]) in img.pixels_mut() {
                [*r, *g, *b] = f([*r, *g, *b]);
            }
            DynamicImage::ImageRgba8(img)
        }
        DynamicImage::ImageRgb8(mut img) => {
            for Rgb(px) in img.pixels_mut() {
                *px = f(*px);
            }
            DynamicImage::ImageRgb8(img)
        }
        other => {
            let mut img: RgbImage = other.to_rgb8();
            for Rgb(px) in img.pixels_mut() {
                *px = f(*px);
            }
            DynamicImage::ImageRgb8(img)
        }
    }
}
