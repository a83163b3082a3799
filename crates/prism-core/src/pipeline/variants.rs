//! Variant matrix planning.

use crate::config::{Config, PngMode};
use crate::types::{ImageMetadata, VariantFormat, VariantSpec};

/// Expand configured widths × enabled formats into concrete specs.
///
/// Widths above the original are dropped (never enlarge); a width equal to
/// the original is kept. JPEG is always planned. PNG is planned only for
/// alpha-bearing sources. Output is ordered by width, then format.
pub fn plan_variants(metadata: &ImageMetadata, config: &Config) -> Vec<VariantSpec> {
    let source_width = if config.processing.auto_rotate {
        metadata.oriented_width()
    } else {
        metadata.width
    };
    let mut widths: Vec<u32> = config
        .variants
        .widths
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= source_width)
        .collect();
    widths.sort_unstable();
    widths.dedup();

    let formats = enabled_formats(metadata, config);
    let mut specs = Vec::with_capacity(widths.len() * formats.len());
    for &target_width in &widths {
        for &(format, quality) in &formats {
            specs.push(VariantSpec {
                target_width,
                format,
                quality,
            });
        }
    }

    tracing::debug!(
        widths = widths.len(),
        formats = formats.len(),
        specs = specs.len(),
        source_width,
        "Planned variants"
    );
    specs
}

fn enabled_formats(metadata: &ImageMetadata, config: &Config) -> Vec<(VariantFormat, u8)> {
    let quality = &config.quality;
    let mut formats = Vec::with_capacity(4);
    if config.variants.avif {
        formats.push((VariantFormat::Avif, quality.avif));
    }
    if config.variants.webp {
        formats.push((VariantFormat::Webp, quality.webp));
    }
    formats.push((VariantFormat::Jpeg, quality.jpeg));
    if metadata.has_alpha && config.variants.png == PngMode::AlphaOnly {
        formats.push((VariantFormat::Png, quality.png_compression));
    }
    formats
}
