//! Configuration management for Prism.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default` with the production values,
//! so a missing file or a partial file both yield a complete configuration.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Prism.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage path conventions
    pub paths: PathsConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Target widths, enabled formats and batch concurrency
    pub variants: VariantsConfig,

    /// Per-format encoder settings
    pub quality: QualityConfig,

    /// Tone curve and color enhancement
    pub tone: ToneConfig,

    /// Noise reduction
    pub denoise: DenoiseConfig,

    /// Post-resize sharpening
    pub sharpen: SharpenConfig,

    /// Orientation, color space and metadata handling
    pub processing: ProcessingConfig,

    /// Cache-Control headers for published variants
    pub cache: CacheConfig,

    /// Blur-up placeholder settings
    pub placeholder: PlaceholderConfig,

    /// Local store backend (used by the CLI)
    pub store: StoreConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.prism.prism/config.toml
    /// - Linux: ~/.config/prism/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\prism\config\config.toml
    ///
    /// Falls back to ~/.prism/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "prism", "prism")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".prism").join("config.toml")
            })
    }

    /// Get the resolved local store root (with ~ expansion).
    pub fn store_root(&self) -> PathBuf {
        let path_str = self.store.root.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.variants.widths, vec![400, 800, 1200, 1600, 2000, 2400]);
        assert_eq!(config.variants.concurrency, 3);
        assert_eq!(config.limits.max_pixels, 75_000_000);
        assert_eq!(config.limits.max_bytes, 60_000_000);
        assert_eq!(config.paths.originals_prefix, "products/");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[variants]"));
        assert!(toml.contains("png = \"alpha-only\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [variants]
            widths = [320, 768]

            [tone]
            filmic = false
            "#,
        )
        .unwrap();
        assert_eq!(config.variants.widths, vec![320, 768]);
        assert_eq!(config.variants.concurrency, 3);
        assert!(!config.tone.filmic);
        assert_eq!(config.quality.jpeg, 86);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[variants]\nconcurrency = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("variants.concurrency"));
    }

    #[test]
    fn test_store_root_expands_tilde() {
        let config = Config::default();
        assert!(!config.store_root().to_string_lossy().starts_with('~'));
    }
}
