//! Core data types for the Prism variant pipeline.
//!
//! Everything here except [`CacheRecord`] and [`OriginalTag`] lives for a
//! single invocation. Those two are the durable outputs.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::pipeline::hash::Fingerprint;

/// Custom metadata attached to stored objects.
pub type CustomMetadata = BTreeMap<String, String>;

/// Upload notification delivered by the storage trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    /// Object path inside the bucket
    pub storage_path: String,

    /// Declared MIME type, if the uploader set one
    #[serde(default)]
    pub content_type: Option<String>,

    /// Declared size in bytes
    #[serde(default)]
    pub size: Option<DeclaredSize>,

    /// Bucket identifier
    pub bucket: String,
}

impl UploadEvent {
    /// Declared size in bytes, `0` when absent or unparseable.
    pub fn byte_size(&self) -> u64 {
        self.size.as_ref().map(DeclaredSize::bytes).unwrap_or(0)
    }
}

/// Size as delivered by storage triggers: either a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclaredSize {
    Number(u64),
    Text(String),
}

impl DeclaredSize {
    pub fn bytes(&self) -> u64 {
        match self {
            DeclaredSize::Number(n) => *n,
            DeclaredSize::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

/// Properties of the source image, read from its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Width in pixels as stored (before orientation)
    pub width: u32,

    /// Height in pixels as stored (before orientation)
    pub height: u32,

    /// Container format ("jpeg", "png", "webp", ...)
    pub format: String,

    /// Whether the pixel format carries an alpha channel
    pub has_alpha: bool,

    /// "srgb", "b-w", or "icc" when an embedded profile is present
    pub color_space: String,

    /// Size of the raw buffer in bytes
    pub byte_size: u64,

    /// EXIF orientation (1-8), if tagged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
}

impl ImageMetadata {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width once the EXIF orientation is applied (5-8 transpose the image).
    pub fn oriented_width(&self) -> u32 {
        match self.orientation {
            Some(5..=8) => self.height,
            _ => self.width,
        }
    }
}

/// Output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFormat {
    /// Next-gen compressed format
    Avif,
    /// Widely compatible compressed format
    Webp,
    /// Baseline fallback, always emitted
    Jpeg,
    /// Lossless, alpha-bearing sources only
    Png,
}

impl VariantFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VariantFormat::Avif => "avif",
            VariantFormat::Webp => "webp",
            VariantFormat::Jpeg => "jpeg",
            VariantFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            VariantFormat::Avif => "image/avif",
            VariantFormat::Webp => "image/webp",
            VariantFormat::Jpeg => "image/jpeg",
            VariantFormat::Png => "image/png",
        }
    }

    /// Parse a format name (case-insensitive, "jpg" accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "avif" => Some(Self::Avif),
            "webp" => Some(Self::Webp),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

impl fmt::Display for VariantFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One entry of the variant matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub target_width: u32,
    pub format: VariantFormat,
    /// Quality (AVIF/WebP/JPEG) or compression level (PNG)
    pub quality: u8,
}

impl VariantSpec {
    /// Key used in the cache record, e.g. `"800w.avif"`.
    pub fn key(&self) -> String {
        variant_key(self.target_width, self.format)
    }
}

/// Build a variant key from its parts.
pub fn variant_key(width: u32, format: VariantFormat) -> String {
    format!("{}w.{}", width, format.extension())
}

/// Encoded output of one [`VariantSpec`].
#[derive(Debug, Clone)]
pub struct VariantResult {
    pub spec: VariantSpec,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: VariantFormat,
    pub byte_size: u64,
    pub elapsed_ms: u64,
}

/// A variant after upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedVariant {
    pub key: String,
    pub public_url: String,
}

/// Durable record of a processed fingerprint. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub content_hash: Fingerprint,
    pub original_width: u32,
    pub original_height: u32,
    pub original_format: String,
    pub original_size: u64,
    pub has_alpha: bool,
    /// Inline `data:` URI placeholder
    pub lqip: String,
    /// variant key -> public URL
    pub variants: BTreeMap<String, String>,
    pub widths: Vec<u32>,
    pub formats: Vec<VariantFormat>,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

impl CacheRecord {
    /// Assemble a record from published variants.
    pub fn new(
        content_hash: Fingerprint,
        metadata: &ImageMetadata,
        lqip: String,
        published: &[PublishedVariant],
        results: &[VariantResult],
        processing_time_ms: u64,
    ) -> Self {
        let variants = published
            .iter()
            .map(|p| (p.key.clone(), p.public_url.clone()))
            .collect();
        let widths: BTreeSet<u32> = results.iter().map(|r| r.spec.target_width).collect();
        let formats: BTreeSet<VariantFormat> = results.iter().map(|r| r.format).collect();

        Self {
            content_hash,
            original_width: metadata.width,
            original_height: metadata.height,
            original_format: metadata.format.clone(),
            original_size: metadata.byte_size,
            has_alpha: metadata.has_alpha,
            lqip,
            variants,
            widths: widths.into_iter().collect(),
            formats: formats.into_iter().collect(),
            processed_at: Utc::now(),
            processing_time_ms,
        }
    }
}

/// Metadata written back onto the original upload.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalTag {
    pub content_hash: Fingerprint,
    pub variants_generated: bool,
    pub variant_count: usize,
    pub processed_at: DateTime<Utc>,
    pub lqip: String,
}

impl OriginalTag {
    /// Tag pointing at an existing cache record.
    pub fn from_record(record: &CacheRecord) -> Self {
        Self {
            content_hash: record.content_hash.clone(),
            variants_generated: true,
            variant_count: record.variants.len(),
            processed_at: Utc::now(),
            lqip: record.lqip.clone(),
        }
    }

    /// Render as object custom metadata (all values are strings).
    pub fn to_metadata(&self) -> CustomMetadata {
        let mut map = CustomMetadata::new();
        map.insert("contentHash".into(), self.content_hash.to_string());
        map.insert(
            "variantsGenerated".into(),
            self.variants_generated.to_string(),
        );
        map.insert("variantCount".into(), self.variant_count.to_string());
        map.insert("processedAt".into(), rfc3339(&self.processed_at));
        map.insert("lqip".into(), self.lqip.clone());
        map
    }
}

/// Failure entry appended to the error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file_path: String,
    pub error: String,
    /// Error with its full `source()` chain
    pub stack: String,
    /// Stage the invocation was in when it failed
    pub stage: String,
    pub timestamp: DateTime<Utc>,
}

/// Why the gate turned an upload away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAnOriginal,
    VariantOutput,
    MissingContentType,
    UnsupportedContentType(String),
    EmptyFile,
    TooLarge { size: u64, max: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnOriginal => write!(f, "not in originals path"),
            SkipReason::VariantOutput => write!(f, "path is a generated variant"),
            SkipReason::MissingContentType => write!(f, "no content type"),
            SkipReason::UnsupportedContentType(ct) => write!(f, "unsupported content type {ct}"),
            SkipReason::EmptyFile => write!(f, "file is empty"),
            SkipReason::TooLarge { size, max } => {
                write!(f, "file too large: {size} bytes (max: {max})")
            }
        }
    }
}

/// Result of a single invocation. The coordinator never returns an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// The gate rejected the upload; nothing was touched.
    Skipped { reason: SkipReason },
    /// Variants already existed; only the original was re-tagged.
    CacheHit { content_hash: Fingerprint },
    /// Variants were generated and published.
    Processed(ProcessSummary),
    /// Something failed after the gate; see the error log.
    Failed { error: String },
}

impl ProcessOutcome {
    /// True for every outcome except `Failed`.
    pub fn is_success(&self) -> bool {
        !matches!(self, ProcessOutcome::Failed { .. })
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            ProcessOutcome::CacheHit { content_hash } => Some(content_hash),
            ProcessOutcome::Processed(summary) => Some(&summary.content_hash),
            _ => None,
        }
    }
}

/// Summary of a cache-miss invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub content_hash: Fingerprint,
    pub variant_count: usize,
    pub processing_time_ms: u64,
}

pub(crate) fn rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_event_size_number_or_string() {
        let from_number: UploadEvent = serde_json::from_str(
            r#"{"storagePath":"products/a.jpg","contentType":"image/jpeg","size":1024,"bucket":"b"}"#,
        )
        .unwrap();
        assert_eq!(from_number.byte_size(), 1024);

        let from_string: UploadEvent = serde_json::from_str(
            r#"{"storagePath":"products/a.jpg","contentType":"image/jpeg","size":"2048","bucket":"b"}"#,
        )
        .unwrap();
        assert_eq!(from_string.byte_size(), 2048);
    }

    #[test]
    fn test_upload_event_missing_fields() {
        let event: UploadEvent =
            serde_json::from_str(r#"{"storagePath":"products/a.jpg","bucket":"b"}"#).unwrap();
        assert!(event.content_type.is_none());
        assert_eq!(event.byte_size(), 0);
    }

    #[test]
    fn test_unparseable_size_is_zero() {
        assert_eq!(DeclaredSize::Text("lots".into()).bytes(), 0);
    }

    #[test]
    fn test_variant_key() {
        let spec = VariantSpec {
            target_width: 800,
            format: VariantFormat::Avif,
            quality: 50,
        };
        assert_eq!(spec.key(), "800w.avif");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(VariantFormat::parse("JPG"), Some(VariantFormat::Jpeg));
        assert_eq!(VariantFormat::parse("webp"), Some(VariantFormat::Webp));
        assert_eq!(VariantFormat::parse("gif"), None);
    }

    #[test]
    fn test_original_tag_metadata_strings() {
        let tag = OriginalTag {
            content_hash: Fingerprint::from_hex("0123456789abcdef").unwrap(),
            variants_generated: true,
            variant_count: 12,
            processed_at: Utc::now(),
            lqip: "data:image/jpeg;base64,AAAA".into(),
        };
        let map = tag.to_metadata();
        assert_eq!(map["contentHash"], "0123456789abcdef");
        assert_eq!(map["variantsGenerated"], "true");
        assert_eq!(map["variantCount"], "12");
        assert!(map["processedAt"].ends_with('Z'));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = ProcessOutcome::Skipped {
            reason: SkipReason::EmptyFile,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"skipped\""));
        assert!(outcome.is_success());
    }
}
