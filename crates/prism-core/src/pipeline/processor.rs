//! Pipeline orchestration: one upload event in, one [`ProcessOutcome`] out.
//!
//! ```text
//! Validating → CacheCheck ─┬─ hit ──→ CacheHit (re-tag original) ─────────────┐
//!                          └─ miss → Processing → Enhancing → Transcoding     │
//!                                    → Placeholding → Publishing              │
//!                                    → CacheWriting → Tagging ───────────→ Done
//! ```
//!
//! Any stage after `Validating` may end in `Failed`. Failures are contained
//! here: they are written to the error log and returned as
//! [`ProcessOutcome::Failed`], never as `Err`.

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{error_chain, PipelineError};
use crate::store::{CacheStore, ErrorLog, ObjectStore, UploadOptions};
use crate::types::{
    rfc3339, CacheRecord, CustomMetadata, ErrorRecord, ImageMetadata, OriginalTag,
    ProcessOutcome, ProcessSummary, PublishedVariant, UploadEvent, VariantResult,
};

use super::batch::BatchScheduler;
use super::enhance::Enhancer;
use super::hash::{Fingerprint, Hasher};
use super::metadata::MetadataInspector;
use super::placeholder::PlaceholderGenerator;
use super::transcode::VariantTranscoder;
use super::validate::Validator;
use super::variants::plan_variants;

/// Where an invocation is. Attached to every logged failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    CacheCheck,
    CacheHit,
    Processing,
    Enhancing,
    Transcoding,
    Placeholding,
    Publishing,
    CacheWriting,
    Tagging,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::CacheCheck => "cache_check",
            Stage::CacheHit => "cache_hit",
            Stage::Processing => "processing",
            Stage::Enhancing => "enhancing",
            Stage::Transcoding => "transcoding",
            Stage::Placeholding => "placeholding",
            Stage::Publishing => "publishing",
            Stage::CacheWriting => "cache_writing",
            Stage::Tagging => "tagging",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cache-and-publish coordinator.
pub struct ImageProcessor {
    config: Config,
    validator: Validator,
    inspector: MetadataInspector,
    enhancer: Enhancer,
    transcoder: Arc<VariantTranscoder>,
    scheduler: BatchScheduler,
    placeholder: Arc<PlaceholderGenerator>,
    objects: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheStore>,
    errors: Arc<dyn ErrorLog>,
}

impl ImageProcessor {
    /// Create a new processor over the given collaborators.
    pub fn new(
        config: Config,
        objects: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheStore>,
        errors: Arc<dyn ErrorLog>,
    ) -> Self {
        Self {
            validator: Validator::new(config.paths.clone(), config.limits.clone()),
            inspector: MetadataInspector::new(config.limits.clone()),
            enhancer: Enhancer::new(&config),
            transcoder: Arc::new(VariantTranscoder::new(&config)),
            scheduler: BatchScheduler::new(config.variants.concurrency),
            placeholder: Arc::new(PlaceholderGenerator::new(config.placeholder.clone())),
            objects,
            cache,
            errors,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle one upload event end to end.
    ///
    /// Gate rejections return `Skipped` without touching any collaborator.
    /// Everything after the gate runs under the invocation timeout.
    pub async fn handle(&self, event: &UploadEvent) -> ProcessOutcome {
        tracing::debug!(path = %event.storage_path, bucket = %event.bucket, "Upload event");

        if let Some(reason) = self.validator.check(event) {
            tracing::debug!(path = %event.storage_path, %reason, "Skipping upload");
            return ProcessOutcome::Skipped { reason };
        }

        let timeout_ms = self.config.limits.invocation_timeout_ms;
        let mut stage = Stage::CacheCheck;
        let timed = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.run(event, &mut stage),
        )
        .await;
        let result = match timed {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                stage: stage.to_string(),
                timeout_ms,
            }),
        };

        match result {
            Ok(outcome) => outcome,
            Err(error) => self.fail(event, stage, error).await,
        }
    }

    async fn run(
        &self,
        event: &UploadEvent,
        stage: &mut Stage,
    ) -> Result<ProcessOutcome, PipelineError> {
        let start = Instant::now();
        let path = event.storage_path.as_str();

        *stage = Stage::CacheCheck;
        let data = Bytes::from(self.objects.download(&event.bucket, path).await.map_err(
            |source| PipelineError::Fetch {
                target: path.to_string(),
                source,
            },
        )?);
        tracing::trace!(
            path,
            bytes = data.len(),
            elapsed = ?start.elapsed(),
            "Downloaded original"
        );

        let fingerprint = Hasher::fingerprint(&data);
        let cached = self
            .cache
            .get(&fingerprint)
            .await
            .map_err(|source| PipelineError::Fetch {
                target: format!("cache/{}", fingerprint),
                source,
            })?;

        if let Some(record) = cached {
            *stage = Stage::CacheHit;
            tracing::info!(path, content_hash = %fingerprint, "Cache hit, re-tagging original");
            self.tag_original(event, &OriginalTag::from_record(&record)).await?;
            *stage = Stage::Done;
            return Ok(ProcessOutcome::CacheHit {
                content_hash: fingerprint,
            });
        }

        *stage = Stage::Processing;
        let metadata = self.inspector.inspect(&data)?;
        tracing::debug!(
            path,
            content_hash = %fingerprint,
            width = metadata.width,
            height = metadata.height,
            format = %metadata.format,
            has_alpha = metadata.has_alpha,
            "Inspected original"
        );
        let specs = plan_variants(&metadata, &self.config);
        if specs.is_empty() {
            tracing::warn!(
                path,
                width = metadata.width,
                "Original is narrower than every configured width; no variants"
            );
        }

        *stage = Stage::Enhancing;
        let stage_start = Instant::now();
        let enhanced = self.enhancer.enhance(data.clone(), &metadata).await?;
        tracing::trace!(elapsed = ?stage_start.elapsed(), "Enhanced");

        *stage = Stage::Transcoding;
        let stage_start = Instant::now();
        let transcoder = Arc::clone(&self.transcoder);
        let original = metadata.clone();
        let results = self
            .scheduler
            .run(specs, move |spec| {
                transcoder.transcode(&enhanced.fork(), &spec, &original)
            })
            .await?;
        tracing::trace!(
            variants = results.len(),
            elapsed = ?stage_start.elapsed(),
            "Transcoded"
        );

        *stage = Stage::Placeholding;
        let placeholder = Arc::clone(&self.placeholder);
        let raw = data.clone();
        let lqip = tokio::task::spawn_blocking(move || placeholder.generate(&raw))
            .await
            .map_err(|e| PipelineError::Unknown(format!("Placeholder task failed: {}", e)))??;

        *stage = Stage::Publishing;
        let stage_start = Instant::now();
        let published = self
            .publish(event, &fingerprint, &metadata, &results)
            .await?;
        tracing::trace!(
            uploaded = published.len(),
            elapsed = ?stage_start.elapsed(),
            "Published"
        );

        *stage = Stage::CacheWriting;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let record = CacheRecord::new(
            fingerprint.clone(),
            &metadata,
            lqip,
            &published,
            &results,
            elapsed_ms,
        );
        let written = self
            .cache
            .set(&fingerprint, &record)
            .await
            .map_err(|source| PipelineError::Publish {
                target: format!("cache/{}", fingerprint),
                source,
            })?;
        if !written {
            tracing::warn!(
                content_hash = %fingerprint,
                "Cache record already written by a concurrent invocation"
            );
        }

        *stage = Stage::Tagging;
        self.tag_original(event, &OriginalTag::from_record(&record)).await?;

        *stage = Stage::Done;
        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            path,
            content_hash = %fingerprint,
            variants = results.len(),
            elapsed_ms = processing_time_ms,
            "Processed upload"
        );

        Ok(ProcessOutcome::Processed(ProcessSummary {
            content_hash: fingerprint,
            variant_count: results.len(),
            processing_time_ms,
        }))
    }

    /// Upload every variant concurrently; the first failure fails the stage.
    async fn publish(
        &self,
        event: &UploadEvent,
        fingerprint: &Fingerprint,
        metadata: &ImageMetadata,
        results: &[VariantResult],
    ) -> Result<Vec<PublishedVariant>, PipelineError> {
        let base_name = base_name(&event.storage_path);
        let cache_control = self.config.cache.header_value();
        let generated_at = rfc3339(&Utc::now());

        let uploads = results.iter().map(|result| {
            let target = variant_path(
                &self.config.paths.variants_prefix,
                fingerprint,
                base_name,
                result,
            );
            let mut custom_metadata = CustomMetadata::new();
            custom_metadata.insert("originalWidth".into(), metadata.width.to_string());
            custom_metadata.insert("originalHeight".into(), metadata.height.to_string());
            custom_metadata.insert("variantWidth".into(), result.width.to_string());
            custom_metadata.insert("variantHeight".into(), result.height.to_string());
            custom_metadata.insert("contentHash".into(), fingerprint.to_string());
            custom_metadata.insert("generatedAt".into(), generated_at.clone());

            let options = UploadOptions {
                content_type: result.format.content_type().to_string(),
                cache_control: cache_control.clone(),
                custom_metadata,
                public: true,
            };
            let key = result.spec.key();
            let objects = Arc::clone(&self.objects);
            let bucket = event.bucket.clone();
            let data = result.bytes.clone();

            async move {
                let public_url = objects
                    .upload(&bucket, &target, data, options)
                    .await
                    .map_err(|source| PipelineError::Publish {
                        target: target.clone(),
                        source,
                    })?;
                tracing::trace!(%target, "Uploaded variant");
                Ok::<_, PipelineError>(PublishedVariant { key, public_url })
            }
        });

        try_join_all(uploads).await
    }

    async fn tag_original(
        &self,
        event: &UploadEvent,
        tag: &OriginalTag,
    ) -> Result<(), PipelineError> {
        self.objects
            .set_metadata(&event.bucket, &event.storage_path, tag.to_metadata())
            .await
            .map_err(|source| PipelineError::Publish {
                target: event.storage_path.clone(),
                source,
            })
    }

    /// Record a contained failure and turn it into an outcome.
    async fn fail(
        &self,
        event: &UploadEvent,
        stage: Stage,
        error: PipelineError,
    ) -> ProcessOutcome {
        let message = error.to_string();
        tracing::error!(
            path = %event.storage_path,
            stage = %stage,
            error = %message,
            "Processing failed"
        );

        let record = ErrorRecord {
            file_path: event.storage_path.clone(),
            error: message.clone(),
            stack: error_chain(&error),
            stage: stage.to_string(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.errors.append(record).await {
            tracing::error!(error = %e, "Failed to write error log entry");
        }

        ProcessOutcome::Failed { error: message }
    }
}

/// File name of the original without its last extension.
pub fn base_name(storage_path: &str) -> &str {
    let file_name = storage_path.rsplit('/').next().unwrap_or(storage_path);
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}

/// `{variants_prefix}{fingerprint}/{base}-{width}w.{ext}`
pub fn variant_path(
    variants_prefix: &str,
    fingerprint: &Fingerprint,
    base_name: &str,
    result: &VariantResult,
) -> String {
    format!(
        "{}{}/{}-{}w.{}",
        variants_prefix,
        fingerprint,
        base_name,
        result.spec.target_width,
        result.format.extension()
    )
}
