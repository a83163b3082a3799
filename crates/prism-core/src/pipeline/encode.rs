//! Per-format encoders for variant output.
//!
//! Every encoder works from raw pixels, so no EXIF, XMP or GPS block from the
//! upload can survive into a variant. The only metadata that may be carried
//! over is the ICC profile, and only when the caller hands one in.

use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage, RgbaImage};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::ImageICC;
use mozjpeg::{ColorSpace, Compress};
use webp::WebPConfig;

use crate::config::QualityConfig;
use crate::error::PipelineError;
use crate::types::{VariantFormat, VariantSpec};

/// Encodes resized pixels into a variant's target format.
#[derive(Debug, Clone)]
pub struct VariantEncoder {
    quality: QualityConfig,
}

impl VariantEncoder {
    pub fn new(quality: QualityConfig) -> Self {
        Self { quality }
    }

    /// Encode `image` as described by `spec`.
    ///
    /// `image` is expected in canonical form (RGB8 or RGBA8). An ICC
    /// profile, when given, is embedded in JPEG, WebP and PNG output.
    pub fn encode(
        &self,
        image: &DynamicImage,
        spec: &VariantSpec,
        icc_profile: Option<&[u8]>,
    ) -> Result<Vec<u8>, PipelineError> {
        let encoded = match spec.format {
            VariantFormat::Avif => self.encode_avif(image, spec.quality),
            VariantFormat::Webp => self.encode_webp(image, spec.quality),
            VariantFormat::Jpeg => encode_jpeg(image, spec.quality),
            VariantFormat::Png => encode_png(image, spec.quality),
        }
        .map_err(|message| PipelineError::Encode {
            variant: spec.key(),
            message,
        })?;

        match icc_profile {
            Some(icc) => attach_icc_profile(spec.format, encoded, icc).map_err(|message| {
                PipelineError::Encode {
                    variant: spec.key(),
                    message,
                }
            }),
            None => Ok(encoded),
        }
    }

    fn encode_avif(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        let encoder =
            AvifEncoder::new_with_speed_quality(&mut buf, self.quality.avif_speed, quality);
        write_canonical(encoder, image)?;
        Ok(buf)
    }

    fn encode_webp(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
        let mut config =
            WebPConfig::new().map_err(|_| "Failed to initialize WebP config".to_string())?;
        config.lossless = 0;
        config.quality = f32::from(quality);
        config.method = i32::from(self.quality.webp_effort);

        let (width, height) = (image.width(), image.height());
        let memory = match image {
            DynamicImage::ImageRgba8(rgba) => {
                webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_advanced(&config)
            }
            other => {
                let rgb = other.to_rgb8();
                webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_advanced(&config)
            }
        }
        .map_err(|e| format!("WebP encoding failed: {:?}", e))?;

        Ok(memory.to_vec())
    }
}

/// Progressive, Huffman-optimized 4:2:0 JPEG via mozjpeg.
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = match image {
        DynamicImage::ImageRgba8(rgba) => flatten_onto_white(rgba),
        other => other.to_rgb8(),
    };
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err("Cannot encode an empty image as JPEG".to_string());
    }

    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_color_space(ColorSpace::JCS_YCbCr);
    comp.set_quality(f32::from(quality.clamp(1, 100)));
    comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_optimize_scans(true);

    let capacity = (width as usize * height as usize * 3 / 10).max(4096);
    let mut writer = comp
        .start_compress(Vec::with_capacity(capacity))
        .map_err(|e| format!("mozjpeg: failed to start compress: {}", e))?;
    writer
        .write_scanlines(rgb.as_raw())
        .map_err(|e| format!("mozjpeg: failed to write scanlines: {}", e))?;
    writer
        .finish()
        .map_err(|e| format!("mozjpeg: failed to finish: {}", e))
}

fn encode_png(image: &DynamicImage, level: u8) -> Result<Vec<u8>, String> {
    let compression = match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive);
    write_canonical(encoder, image)?;
    Ok(buf)
}

fn write_canonical<E: ImageEncoder>(encoder: E, image: &DynamicImage) -> Result<(), String> {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => encoder
            .write_image(
                image.as_bytes(),
                image.width(),
                image.height(),
                image.color().into(),
            )
            .map_err(|e| e.to_string()),
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            encoder
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| e.to_string())
        }
        other => {
            let rgb = other.to_rgb8();
            encoder
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                )
                .map_err(|e| e.to_string())
        }
    }
}

/// Composite RGBA over a white background for formats without alpha.
fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn attach_icc_profile(
    format: VariantFormat,
    encoded: Vec<u8>,
    icc: &[u8],
) -> Result<Vec<u8>, String> {
    let data = Bytes::from(encoded);
    let icc = Some(Bytes::copy_from_slice(icc));
    let mut output = Vec::new();
    match format {
        VariantFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(data)
                .map_err(|e| format!("Failed to parse JPEG for ICC: {}", e))?;
            jpeg.set_icc_profile(icc);
            jpeg.encoder().write_to(&mut output)
        }
        VariantFormat::Png => {
            let mut png = Png::from_bytes(data)
                .map_err(|e| format!("Failed to parse PNG for ICC: {}", e))?;
            png.set_icc_profile(icc);
            png.encoder().write_to(&mut output)
        }
        VariantFormat::Webp => {
            let mut webp = WebP::from_bytes(data)
                .map_err(|e| format!("Failed to parse WebP for ICC: {}", e))?;
            webp.set_icc_profile(icc);
            webp.encoder().write_to(&mut output)
        }
        // AVIF carries color in its own nclx box
        VariantFormat::Avif => return Ok(data.to_vec()),
    }
    .map_err(|e| format!("Failed to write ICC profile: {}", e))?;
    Ok(output)
}
