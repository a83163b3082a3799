//! Variant pipeline stages.
//!
//! - **validate**: event-only eligibility gate
//! - **hash**: content fingerprint of the raw upload
//! - **metadata**: header-only inspection
//! - **decode**: format detection and timed decoding
//! - **enhance**: fixed, ordered tone and color stages applied once
//! - **variants**: width × format planning
//! - **transcode** / **encode**: resize, sharpen and encode one variant
//! - **batch**: windowed concurrency for the transcodes
//! - **placeholder**: inline LQIP
//! - **processor**: orchestrates everything and contains failures

pub mod batch;
pub mod decode;
pub mod encode;
pub mod enhance;
pub mod hash;
pub mod metadata;
pub mod placeholder;
pub mod processor;
pub mod transcode;
pub mod validate;
pub mod variants;

// Re-exports for convenient access
pub use batch::BatchScheduler;
pub use decode::{DecodedImage, ImageDecoder};
pub use encode::VariantEncoder;
pub use enhance::{EnhancedImage, Enhancer};
pub use hash::{Fingerprint, Hasher};
pub use metadata::MetadataInspector;
pub use placeholder::PlaceholderGenerator;
pub use processor::{ImageProcessor, Stage};
pub use transcode::VariantTranscoder;
pub use validate::Validator;
pub use variants::plan_variants;
