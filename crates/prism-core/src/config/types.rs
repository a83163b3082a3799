//! Sub-configuration structs with production defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage path conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Prefix under which original uploads land
    pub originals_prefix: String,

    /// Prefix under which generated variants are written
    pub variants_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            originals_prefix: "products/".to_string(),
            variants_prefix: "products/variants/".to_string(),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum width x height of a source image
    pub max_pixels: u64,

    /// Maximum declared upload size in bytes
    pub max_bytes: u64,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Wall-clock ceiling for a whole invocation in milliseconds
    pub invocation_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pixels: 75_000_000,
            max_bytes: 60_000_000,
            decode_timeout_ms: 30_000,
            invocation_timeout_ms: 540_000,
        }
    }
}

/// When to emit PNG variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PngMode {
    /// Only for sources with an alpha channel
    AlphaOnly,
    /// Never
    Never,
}

/// Variant matrix settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantsConfig {
    /// Target output widths for responsive images
    pub widths: Vec<u32>,

    /// Max transcodes running at once
    pub concurrency: usize,

    /// Generate AVIF variants
    pub avif: bool,

    /// Generate WebP variants
    pub webp: bool,

    /// PNG policy; JPEG is always generated as the fallback
    pub png: PngMode,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            widths: vec![400, 800, 1200, 1600, 2000, 2400],
            concurrency: 3,
            avif: true,
            webp: true,
            png: PngMode::AlphaOnly,
        }
    }
}

/// Encoder settings per output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// AVIF quality (45-55 recommended)
    pub avif: u8,

    /// AVIF encoder speed (1-10, higher is faster with less compression)
    pub avif_speed: u8,

    /// WebP quality (80-85 recommended)
    pub webp: u8,

    /// WebP method (0-6, higher is slower with better compression)
    pub webp_effort: u8,

    /// JPEG quality (82-88 recommended)
    pub jpeg: u8,

    /// PNG compression level (0-9)
    pub png_compression: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            avif: 50,
            avif_speed: 6,
            webp: 82,
            webp_effort: 6,
            jpeg: 86,
            png_compression: 9,
        }
    }
}

/// Tone and color enhancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Apply the tone curve stage
    pub filmic: bool,

    /// Midtone contrast; the midtone gamma is `1 + mid_contrast`
    pub mid_contrast: f32,

    /// Fraction of darkest pixels clipped to black by the stretch
    pub shadow_lift: f32,

    /// Fraction of brightest pixels clipped to white by the stretch
    pub highlight_protect: f32,

    /// Extra saturation for muted colors
    pub vibrance: f32,

    /// Extra saturation standing in for dehaze
    pub dehaze: f32,

    /// Global saturation multiplier
    pub saturation: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            filmic: true,
            mid_contrast: 0.08,
            shadow_lift: 0.06,
            highlight_protect: 0.08,
            vibrance: 0.06,
            dehaze: 0.05,
            saturation: 1.0,
        }
    }
}

/// Noise reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Chroma noise reduction strength
    pub chroma: f32,

    /// Luma noise reduction strength
    pub luma: f32,

    /// Strength above which the median filter engages
    pub threshold: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            chroma: 0.2,
            luma: 0.0,
            threshold: 0.3,
        }
    }
}

/// Post-resize sharpening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpenConfig {
    /// Base unsharp amount, scaled by the downscale ratio
    pub amount_base: f32,

    /// Gaussian sigma of the unsharp mask, in pixels
    pub radius: f32,

    /// Minimum per-channel difference that gets sharpened
    pub threshold: u8,

    /// Cap on the downscale ratio used to scale the amount
    pub max_scale: f32,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            amount_base: 0.6,
            radius: 0.8,
            threshold: 2,
            max_scale: 2.5,
        }
    }
}

/// Orientation, color space and metadata handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Bake EXIF orientation into pixel data
    pub auto_rotate: bool,

    /// Canonical color space for every variant ("srgb")
    pub color_space: String,

    /// Drop all embedded metadata from variants; when false the source
    /// ICC profile is carried over
    pub strip_metadata: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            color_space: "srgb".to_string(),
            strip_metadata: true,
        }
    }
}

/// Cache-Control settings for published variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// max-age in seconds
    pub max_age: u64,

    /// Add the `immutable` directive
    pub immutable: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: 31_536_000,
            immutable: true,
        }
    }
}

impl CacheConfig {
    /// Render the Cache-Control header value.
    pub fn header_value(&self) -> String {
        if self.immutable {
            format!("public, max-age={}, immutable", self.max_age)
        } else {
            format!("public, max-age={}", self.max_age)
        }
    }
}

/// Blur-up placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// Placeholder width in pixels
    pub width: u32,

    /// JPEG quality of the placeholder
    pub quality: u8,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            width: 20,
            quality: 30,
        }
    }
}

/// Local filesystem store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory; each bucket is a sub-directory
    pub root: PathBuf,

    /// Base URL for published objects. Defaults to `file://` URLs under `root`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.prism/store"),
            public_base_url: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
