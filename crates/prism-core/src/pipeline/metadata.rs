//! Header-only image inspection.

use exif::{In, Reader, Tag, Value};
use image::{ColorType, ImageDecoder, ImageReader};
use std::io::Cursor;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::pipeline::decode::format_to_string;
use crate::types::ImageMetadata;

/// Reads dimensions, format, alpha and color space without decoding pixels.
pub struct MetadataInspector {
    limits: LimitsConfig,
}

impl MetadataInspector {
    /// Create a new inspector with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Probe the raw buffer.
    ///
    /// Fails with `InvalidImage` when the format or dimensions cannot be
    /// read, and with `ImageTooLarge` when the pixel count exceeds the
    /// configured ceiling.
    pub fn inspect(&self, data: &[u8]) -> Result<ImageMetadata, PipelineError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| PipelineError::InvalidImage {
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = reader.format().ok_or_else(|| PipelineError::InvalidImage {
            message: "Unrecognized image format".to_string(),
        })?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| PipelineError::InvalidImage {
                message: format!("Cannot read image header: {}", e),
            })?;

        let (width, height) = decoder.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidImage {
                message: "Invalid image: missing dimensions".to_string(),
            });
        }

        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.limits.max_pixels {
            return Err(PipelineError::ImageTooLarge {
                width,
                height,
                pixels,
                max_pixels: self.limits.max_pixels,
            });
        }

        let color_type = decoder.color_type();
        let has_icc = matches!(decoder.icc_profile(), Ok(Some(ref icc)) if !icc.is_empty());

        Ok(ImageMetadata {
            width,
            height,
            format: format_to_string(format),
            has_alpha: color_type.has_alpha(),
            color_space: color_space_name(color_type, has_icc).to_string(),
            byte_size: data.len() as u64,
            orientation: read_orientation(data),
        })
    }
}

fn color_space_name(color_type: ColorType, has_icc: bool) -> &'static str {
    match color_type {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => "b-w",
        _ if has_icc => "icc",
        _ => "srgb",
    }
}

/// Read the EXIF Orientation tag, if any.
///
/// Lenient: an unreadable EXIF block is treated as untagged.
fn read_orientation(data: &[u8]) -> Option<u32> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
        .filter(|o| (1..=8).contains(o))
}
