//! End-to-end behavior of the variant pipeline over in-memory collaborators.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use prism_core::pipeline::Hasher;
use prism_core::store::{
    LocalCacheStore, LocalErrorLog, LocalObjectStore, MemoryCacheStore, MemoryErrorLog,
    MemoryObjectStore,
};
use prism_core::types::DeclaredSize;
use prism_core::{
    CacheStore, Config, ImageProcessor, ProcessOutcome, SkipReason, UploadEvent, VariantFormat,
};

const BUCKET: &str = "shop";

struct Harness {
    objects: Arc<MemoryObjectStore>,
    cache: Arc<MemoryCacheStore>,
    errors: Arc<MemoryErrorLog>,
    processor: ImageProcessor,
}

impl Harness {
    fn new(config: Config) -> Self {
        let objects = Arc::new(MemoryObjectStore::new("https://cdn.prism.test"));
        let cache = Arc::new(MemoryCacheStore::new());
        let errors = Arc::new(MemoryErrorLog::new());
        let processor =
            ImageProcessor::new(config, objects.clone(), cache.clone(), errors.clone());
        Self {
            objects,
            cache,
            errors,
            processor,
        }
    }

    /// Seed an original and build the matching trigger event.
    fn upload(&self, path: &str, data: &[u8], content_type: &str) -> UploadEvent {
        self.objects
            .insert(BUCKET, path, data.to_vec(), content_type);
        event(path, Some(content_type), data.len() as u64)
    }
}

fn event(path: &str, content_type: Option<&str>, size: u64) -> UploadEvent {
    UploadEvent {
        storage_path: path.to_string(),
        content_type: content_type.map(str::to_string),
        size: Some(DeclaredSize::Text(size.to_string())),
        bucket: BUCKET.to_string(),
    }
}

/// Config that keeps encodes quick without changing what is produced.
fn test_config(widths: &[u32]) -> Config {
    let mut config = Config::default();
    config.variants.widths = widths.to_vec();
    config.quality.avif_speed = 10;
    config.quality.webp_effort = 0;
    config
}

fn photo(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

fn cutout(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        let alpha = if x < width / 2 { 0 } else { 255 };
        Rgba([200, 40, 40, alpha])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn expect_processed(outcome: &ProcessOutcome) -> &prism_core::ProcessSummary {
    match outcome {
        ProcessOutcome::Processed(summary) => summary,
        other => panic!("expected Processed, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_a_full_variant_matrix() {
    let h = Harness::new(test_config(&[320, 768, 1440, 2400]));
    let data = photo(2400, 1600);
    let e = h.upload("products/linen-shirt.jpg", &data, "image/jpeg");

    let outcome = h.processor.handle(&e).await;
    let summary = expect_processed(&outcome);
    assert_eq!(summary.variant_count, 12);
    assert_eq!(summary.content_hash, Hasher::fingerprint(&data));

    let record = h.cache.record(&summary.content_hash).unwrap();
    assert_eq!(record.variants.len(), 12);
    assert_eq!(record.widths, vec![320, 768, 1440, 2400]);
    assert_eq!(
        record.formats,
        vec![VariantFormat::Avif, VariantFormat::Webp, VariantFormat::Jpeg]
    );
    assert!(!record.variants.keys().any(|k| k.ends_with(".png")));
    assert_eq!((record.original_width, record.original_height), (2400, 1600));
    assert!(record.lqip.starts_with("data:image/jpeg;base64,"));

    let prefix = format!("products/variants/{}/", summary.content_hash);
    let stored = h.objects.paths_with_prefix(BUCKET, &prefix);
    assert_eq!(stored.len(), 12);
    assert!(stored.contains(&format!("{}linen-shirt-768w.webp", prefix)));

    let variant = h
        .objects
        .object(BUCKET, &format!("{}linen-shirt-768w.jpeg", prefix))
        .unwrap();
    assert!(variant.public);
    assert_eq!(variant.content_type, "image/jpeg");
    assert_eq!(
        variant.cache_control.as_deref(),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(variant.metadata["variantWidth"], "768");
    assert_eq!(variant.metadata["variantHeight"], "512");
    assert_eq!(variant.metadata["originalWidth"], "2400");
    assert_eq!(variant.metadata["contentHash"], summary.content_hash.as_str());
    let decoded = image::load_from_memory(&variant.data).unwrap();
    assert_eq!(decoded.dimensions(), (768, 512));

    let tag = h.objects.metadata(BUCKET, "products/linen-shirt.jpg").unwrap();
    assert_eq!(tag["variantsGenerated"], "true");
    assert_eq!(tag["variantCount"], "12");
    assert_eq!(tag["contentHash"], summary.content_hash.as_str());
    assert!(h.errors.is_empty());
}

#[tokio::test]
async fn scenario_b_reupload_is_a_cache_hit() {
    let h = Harness::new(test_config(&[64, 128]));
    let data = photo(200, 150);
    let first = h
        .processor
        .handle(&h.upload("products/mug.jpg", &data, "image/jpeg"))
        .await;
    let uploads_after_first = h.objects.upload_count();
    let tags_after_first = h.objects.metadata_write_count();

    // same bytes under another name
    let second = h
        .processor
        .handle(&h.upload("products/mug-copy.jpg", &data, "image/jpeg"))
        .await;

    assert!(matches!(second, ProcessOutcome::CacheHit { .. }));
    assert_eq!(second.fingerprint(), first.fingerprint());
    assert_eq!(h.objects.upload_count(), uploads_after_first);
    assert_eq!(h.objects.metadata_write_count(), tags_after_first + 1);
    assert_eq!(h.cache.len(), 1);

    let tag = h.objects.metadata(BUCKET, "products/mug-copy.jpg").unwrap();
    assert_eq!(tag["variantsGenerated"], "true");
    assert_eq!(tag["variantCount"], "6");
    assert!(tag["lqip"].starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn simultaneous_duplicates_share_one_record() {
    let h = Harness::new(test_config(&[64, 128]));
    let data = photo(200, 150);
    let a = h.upload("products/bowl.jpg", &data, "image/jpeg");
    let b = h.upload("products/bowl-again.jpg", &data, "image/jpeg");

    // both miss the cache before either finishes encoding
    let (first, second) = tokio::join!(h.processor.handle(&a), h.processor.handle(&b));

    let first = expect_processed(&first);
    let second = expect_processed(&second);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(h.cache.len(), 1);
    assert_eq!(h.cache.rejected_write_count(), 1);
    assert!(h.errors.is_empty());

    for path in ["products/bowl.jpg", "products/bowl-again.jpg"] {
        let tag = h.objects.metadata(BUCKET, path).unwrap();
        assert_eq!(tag["variantsGenerated"], "true", "{path}");
        assert_eq!(tag["contentHash"], first.content_hash.as_str(), "{path}");
    }
}

#[tokio::test]
async fn scenario_c_widths_above_original_are_dropped() {
    let h = Harness::new(test_config(&[320, 768, 1440]));
    let data = photo(500, 400);
    let outcome = h
        .processor
        .handle(&h.upload("products/small.jpg", &data, "image/jpeg"))
        .await;

    let summary = expect_processed(&outcome);
    assert_eq!(summary.variant_count, 3);
    let record = h.cache.record(&summary.content_hash).unwrap();
    assert_eq!(record.widths, vec![320]);
    assert!(record.variants.keys().all(|k| k.starts_with("320w.")));
}

#[tokio::test]
async fn scenario_d_alpha_adds_png_variants() {
    let h = Harness::new(test_config(&[64, 128]));
    let data = cutout(160, 100);
    let outcome = h
        .processor
        .handle(&h.upload("products/cutout.png", &data, "image/png"))
        .await;

    let summary = expect_processed(&outcome);
    assert_eq!(summary.variant_count, 8);
    let record = h.cache.record(&summary.content_hash).unwrap();
    assert!(record.has_alpha);
    assert!(record.variants.contains_key("64w.png"));
    assert!(record.variants.contains_key("128w.png"));
    assert!(record.formats.contains(&VariantFormat::Png));

    let png = h
        .objects
        .object(
            BUCKET,
            &format!("products/variants/{}/cutout-128w.png", summary.content_hash),
        )
        .unwrap();
    let decoded = image::load_from_memory(&png.data).unwrap();
    assert!(decoded.color().has_alpha());
    assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0[3], 0);
}

#[tokio::test]
async fn scenario_e_gate_rejections_touch_nothing() {
    let h = Harness::new(test_config(&[64]));
    h.objects
        .insert(BUCKET, "products/a.jpg", photo(100, 100), "image/jpeg");

    let empty = h
        .processor
        .handle(&event("products/a.jpg", Some("image/jpeg"), 0))
        .await;
    assert!(matches!(
        empty,
        ProcessOutcome::Skipped {
            reason: SkipReason::EmptyFile
        }
    ));

    let text = h
        .processor
        .handle(&event("products/a.jpg", Some("text/plain"), 100))
        .await;
    assert!(matches!(
        text,
        ProcessOutcome::Skipped {
            reason: SkipReason::UnsupportedContentType(_)
        }
    ));

    assert_eq!(h.objects.download_count(), 0);
    assert_eq!(h.objects.upload_count(), 0);
    assert!(h.cache.is_empty());
    assert!(h.errors.is_empty());
}

#[tokio::test]
async fn variant_outputs_never_retrigger() {
    let h = Harness::new(test_config(&[64]));
    let outcome = h
        .processor
        .handle(&event(
            "products/variants/0123456789abcdef/mug-64w.jpeg",
            Some("image/jpeg"),
            500,
        ))
        .await;
    assert!(matches!(
        outcome,
        ProcessOutcome::Skipped {
            reason: SkipReason::VariantOutput
        }
    ));
    assert_eq!(h.objects.download_count(), 0);
}

#[tokio::test]
async fn fingerprint_is_deterministic_across_processors() {
    let data = photo(90, 60);
    let a = Harness::new(test_config(&[64]));
    let b = Harness::new(test_config(&[64]));

    let first = a
        .processor
        .handle(&a.upload("products/x.jpg", &data, "image/jpeg"))
        .await;
    let second = b
        .processor
        .handle(&b.upload("products/y.jpg", &data, "image/jpeg"))
        .await;

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.fingerprint(), Some(&Hasher::fingerprint(&data)));
}

#[tokio::test]
async fn batch_completeness_with_small_window() {
    let mut config = test_config(&[16, 32, 48, 64, 80]);
    config.variants.concurrency = 2;
    let h = Harness::new(config);
    let outcome = h
        .processor
        .handle(&h.upload("products/grid.jpg", &photo(100, 100), "image/jpeg"))
        .await;

    // 5 widths × 3 formats with a window of 2: nothing dropped
    let summary = expect_processed(&outcome);
    assert_eq!(summary.variant_count, 15);
    assert_eq!(h.objects.upload_count(), 15);
    assert_eq!(h.cache.record(&summary.content_hash).unwrap().variants.len(), 15);
}

#[tokio::test]
async fn oversized_pixels_are_logged_not_raised() {
    let mut config = test_config(&[64]);
    config.limits.max_pixels = 5_000;
    let h = Harness::new(config);
    let outcome = h
        .processor
        .handle(&h.upload("products/huge.jpg", &photo(100, 100), "image/jpeg"))
        .await;

    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));
    let logged = h.errors.records();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].stage, "processing");
    assert!(logged[0].error.contains("Image too large"));
    assert!(h.cache.is_empty());
    assert_eq!(h.objects.upload_count(), 0);
}

#[tokio::test]
async fn local_stores_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(LocalObjectStore::new(
        dir.path(),
        Some("https://img.shop.test".into()),
    ));
    let cache = Arc::new(LocalCacheStore::new(dir.path()));
    let errors = Arc::new(LocalErrorLog::new(dir.path()));
    let processor = ImageProcessor::new(
        test_config(&[32, 64]),
        objects.clone(),
        cache.clone(),
        errors.clone(),
    );

    let data = photo(100, 80);
    let original = dir.path().join(BUCKET).join("products/lamp.jpg");
    std::fs::create_dir_all(original.parent().unwrap()).unwrap();
    std::fs::write(&original, &data).unwrap();

    let e = event("products/lamp.jpg", Some("image/jpeg"), data.len() as u64);
    let first = processor.handle(&e).await;
    let summary = expect_processed(&first);
    assert_eq!(summary.variant_count, 6);

    let record = cache.get(&summary.content_hash).await.unwrap().unwrap();
    assert_eq!(
        record.variants["64w.webp"],
        format!(
            "https://img.shop.test/shop/products/variants/{}/lamp-64w.webp",
            summary.content_hash
        )
    );
    assert_eq!(
        record.best_variant(30, 2.0, VariantFormat::Webp),
        Some(record.variants["64w.webp"].as_str())
    );

    let second = processor.handle(&e).await;
    assert!(matches!(second, ProcessOutcome::CacheHit { .. }));
    let meta = objects.read_meta(BUCKET, "products/lamp.jpg").await.unwrap();
    assert_eq!(meta.metadata["variantCount"], "6");
    assert!(!errors.path().exists());
}
