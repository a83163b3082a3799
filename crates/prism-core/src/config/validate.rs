//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "variants.concurrency must be > 0".into(),
            ));
        }
        if self.variants.widths.is_empty() {
            return Err(ConfigError::ValidationError(
                "variants.widths must not be empty".into(),
            ));
        }
        if self.variants.widths.contains(&0) {
            return Err(ConfigError::ValidationError(
                "variants.widths must all be > 0".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_pixels must be > 0".into(),
            ));
        }
        if self.limits.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_bytes must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.invocation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.invocation_timeout_ms must be > 0".into(),
            ));
        }
        for (name, value) in [
            ("quality.avif", self.quality.avif),
            ("quality.webp", self.quality.webp),
            ("quality.jpeg", self.quality.jpeg),
            ("placeholder.quality", self.placeholder.quality),
        ] {
            if value == 0 || value > 100 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 100"
                )));
            }
        }
        if !(1..=10).contains(&self.quality.avif_speed) {
            return Err(ConfigError::ValidationError(
                "quality.avif_speed must be between 1 and 10".into(),
            ));
        }
        if self.quality.webp_effort > 6 {
            return Err(ConfigError::ValidationError(
                "quality.webp_effort must be between 0 and 6".into(),
            ));
        }
        if self.quality.png_compression > 9 {
            return Err(ConfigError::ValidationError(
                "quality.png_compression must be between 0 and 9".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.tone.shadow_lift)
            || !(0.0..0.5).contains(&self.tone.highlight_protect)
        {
            return Err(ConfigError::ValidationError(
                "tone.shadow_lift and tone.highlight_protect must be in [0.0, 0.5)".into(),
            ));
        }
        if self.tone.saturation < 0.0 {
            return Err(ConfigError::ValidationError(
                "tone.saturation must be >= 0.0".into(),
            ));
        }
        if self.sharpen.radius <= 0.0 || self.sharpen.max_scale < 1.0 {
            return Err(ConfigError::ValidationError(
                "sharpen.radius must be > 0 and sharpen.max_scale >= 1.0".into(),
            ));
        }
        if !self.processing.color_space.eq_ignore_ascii_case("srgb") {
            return Err(ConfigError::ValidationError(format!(
                "processing.color_space '{}' is not supported (only \"srgb\")",
                self.processing.color_space
            )));
        }
        if self.placeholder.width == 0 {
            return Err(ConfigError::ValidationError(
                "placeholder.width must be > 0".into(),
            ));
        }
        if !self.paths.originals_prefix.ends_with('/') || !self.paths.variants_prefix.ends_with('/')
        {
            return Err(ConfigError::ValidationError(
                "paths.originals_prefix and paths.variants_prefix must end with '/'".into(),
            ));
        }
        Ok(())
    }
}
