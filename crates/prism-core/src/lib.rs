//! Prism Core - upload-triggered image variant pipeline.
//!
//! Prism takes a freshly uploaded product photo and turns it into a
//! deterministic set of resized, re-encoded variants plus a tiny inline
//! placeholder, publishes them, and remembers the result by content so that
//! the same bytes are never processed twice.
//!
//! # Architecture
//!
//! ```text
//! UploadEvent → Validate → Download → Fingerprint → Cache?
//!     hit:  re-tag original
//!     miss: Inspect → Enhance → Transcode (windowed) → Placeholder
//!           → Publish → Cache record → Tag original
//! ```
//!
//! Storage, the cache and the error log are collaborators behind the traits
//! in [`store`]; in-memory and filesystem implementations are included.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prism_core::store::{LocalCacheStore, LocalErrorLog, LocalObjectStore};
//! use prism_core::{Config, ImageProcessor, UploadEvent};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let root = config.store_root();
//!     let processor = ImageProcessor::new(
//!         config.clone(),
//!         Arc::new(LocalObjectStore::new(&root, config.store.public_base_url.clone())),
//!         Arc::new(LocalCacheStore::new(&root)),
//!         Arc::new(LocalErrorLog::new(&root)),
//!     );
//!
//!     let event: UploadEvent = serde_json::from_str(r#"{
//!         "storagePath": "products/shoe.jpg",
//!         "contentType": "image/jpeg",
//!         "size": "482113",
//!         "bucket": "shop"
//!     }"#)?;
//!     println!("{:?}", processor.handle(&event).await);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, PrismError, Result, StoreError};
pub use pipeline::{Fingerprint, ImageProcessor, Stage};
pub use record::parse_variant_key;
pub use store::{CacheStore, ErrorLog, ObjectStore, UploadOptions};
pub use types::{
    CacheRecord, ErrorRecord, ImageMetadata, OriginalTag, ProcessOutcome, ProcessSummary,
    SkipReason, UploadEvent, VariantFormat, VariantResult, VariantSpec,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
