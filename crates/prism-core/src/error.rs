//! Error types for the Prism variant pipeline.
//!
//! Errors are organized by stage so that the error log carries enough
//! context (storage path, stage, specific issue) to diagnose a variant set
//! that never appeared.

use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Collaborator store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image could not be read or decoded
    #[error("Invalid image: {message}")]
    InvalidImage { message: String },

    /// Pixel count exceeds the configured ceiling
    #[error("Image too large: {width}x{height} = {pixels} pixels (max: {max_pixels})")]
    ImageTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    /// A variant failed to encode
    #[error("Encode failed for {variant}: {message}")]
    Encode { variant: String, message: String },

    /// Downloading the original or reading the cache failed
    #[error("Fetch failed for {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: StoreError,
    },

    /// Uploading a variant, writing the cache record or tagging failed
    #[error("Publish failed for {target}: {source}")]
    Publish {
        target: String,
        #[source]
        source: StoreError,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Anything else (task panics, unexpected states)
    #[error("Unexpected failure: {0}")]
    Unknown(String),
}

/// Errors raised by the object store, cache store and error log collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object does not exist
    #[error("Object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    /// Key would escape the store root
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend I/O failure
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Render an error and its `source()` chain, one cause per line.
///
/// This is what lands in the error log's `stack` field.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_store_cause() {
        let err = PipelineError::Publish {
            target: "products/variants/abc/x-400w.jpeg".into(),
            source: StoreError::Backend("bucket is read-only".into()),
        };
        let chain = error_chain(&err);
        assert!(chain.starts_with("Publish failed for products/variants/abc/x-400w.jpeg"));
        assert!(chain.contains("caused by: bucket is read-only"));
    }

    #[test]
    fn test_image_too_large_message() {
        let err = PipelineError::ImageTooLarge {
            width: 10_000,
            height: 10_000,
            pixels: 100_000_000,
            max_pixels: 75_000_000,
        };
        assert!(err.to_string().contains("100000000 pixels"));
    }
}
