//! In-process collaborator implementations.
//!
//! Everything is kept behind a `parking_lot::Mutex`; none of the locks are
//! held across an await point.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CacheStore, ErrorLog, ObjectStore, StoreResult, UploadOptions};
use crate::error::StoreError;
use crate::pipeline::hash::Fingerprint;
use crate::types::{CacheRecord, CustomMetadata, ErrorRecord};

/// An object as held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub metadata: CustomMetadata,
    pub public: bool,
}

/// Object store backed by a map of `(bucket, path)` to object.
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
    metadata_writes: AtomicUsize,
    fail_uploads: Mutex<Option<String>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("https://storage.prism.test")
    }
}

impl MemoryObjectStore {
    /// Public URLs are `{base_url}/{bucket}/{path}`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(BTreeMap::new()),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            metadata_writes: AtomicUsize::new(0),
            fail_uploads: Mutex::new(None),
        }
    }

    /// Seed an object without counting it as an upload.
    pub fn insert(&self, bucket: &str, path: &str, data: Vec<u8>, content_type: &str) {
        self.objects.lock().insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                cache_control: None,
                metadata: CustomMetadata::new(),
                public: false,
            },
        );
    }

    /// Reject every upload whose path contains `pattern`.
    pub fn fail_uploads_matching(&self, pattern: impl Into<String>) {
        *self.fail_uploads.lock() = Some(pattern.into());
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn metadata(&self, bucket: &str, path: &str) -> Option<CustomMetadata> {
        self.object(bucket, path).map(|o| o.metadata)
    }

    /// Paths in `bucket` starting with `prefix`, sorted.
    pub fn paths_with_prefix(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter(|(b, p)| b == bucket && p.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn metadata_write_count(&self) -> usize {
        self.metadata_writes.load(Ordering::SeqCst)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.object(bucket, path)
            .map(|o| o.data)
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<String> {
        if let Some(pattern) = self.fail_uploads.lock().as_deref() {
            if path.contains(pattern) {
                return Err(StoreError::Backend(format!("upload rejected: {}", path)));
            }
        }

        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                data,
                content_type: options.content_type,
                cache_control: Some(options.cache_control),
                metadata: options.custom_metadata,
                public: options.public,
            },
        );
        Ok(self.public_url(bucket, path))
    }

    async fn set_metadata(
        &self,
        bucket: &str,
        path: &str,
        metadata: CustomMetadata,
    ) -> StoreResult<()> {
        let mut objects = self.objects.lock();
        let object = objects
            .get_mut(&(bucket.to_string(), path.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })?;
        object.metadata.extend(metadata);
        self.metadata_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Cache store backed by a hash map.
#[derive(Default)]
pub struct MemoryCacheStore {
    records: Mutex<HashMap<Fingerprint, CacheRecord>>,
    rejected_writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn record(&self, fingerprint: &Fingerprint) -> Option<CacheRecord> {
        self.records.lock().get(fingerprint).cloned()
    }

    /// Writes that lost the first-writer race.
    pub fn rejected_write_count(&self) -> usize {
        self.rejected_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Option<CacheRecord>> {
        Ok(self.record(fingerprint))
    }

    async fn set(&self, fingerprint: &Fingerprint, record: &CacheRecord) -> StoreResult<bool> {
        let mut records = self.records.lock();
        if records.contains_key(fingerprint) {
            self.rejected_writes.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }
        records.insert(fingerprint.clone(), record.clone());
        Ok(true)
    }
}

/// Error log backed by a vector.
#[derive(Default)]
pub struct MemoryErrorLog {
    records: Mutex<Vec<ErrorRecord>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ErrorLog for MemoryErrorLog {
    async fn append(&self, record: ErrorRecord) -> StoreResult<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(fp: &Fingerprint, lqip: &str) -> CacheRecord {
        CacheRecord {
            content_hash: fp.clone(),
            original_width: 10,
            original_height: 10,
            original_format: "jpeg".into(),
            original_size: 100,
            has_alpha: false,
            lqip: lqip.into(),
            variants: BTreeMap::new(),
            widths: vec![],
            formats: vec![],
            processed_at: Utc::now(),
            processing_time_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_object_roundtrip_and_counters() {
        let store = MemoryObjectStore::new("https://cdn.test/");
        store.insert("b", "products/a.jpg", vec![1, 2, 3], "image/jpeg");

        assert_eq!(store.download("b", "products/a.jpg").await.unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            store.download("b", "missing").await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.download_count(), 2);

        let url = store
            .upload(
                "b",
                "products/variants/x.jpeg",
                vec![9],
                UploadOptions {
                    content_type: "image/jpeg".into(),
                    cache_control: "public".into(),
                    public: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/b/products/variants/x.jpeg");
        assert_eq!(store.upload_count(), 1);
        assert!(store.object("b", "products/variants/x.jpeg").unwrap().public);
    }

    #[tokio::test]
    async fn test_set_metadata_merges() {
        let store = MemoryObjectStore::default();
        store.insert("b", "p", vec![], "image/png");
        let mut first = CustomMetadata::new();
        first.insert("a".into(), "1".into());
        store.set_metadata("b", "p", first).await.unwrap();
        let mut second = CustomMetadata::new();
        second.insert("b".into(), "2".into());
        store.set_metadata("b", "p", second).await.unwrap();

        let meta = store.metadata("b", "p").unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(store.metadata_write_count(), 2);
        assert!(store.set_metadata("b", "nope", CustomMetadata::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_failure_injection() {
        let store = MemoryObjectStore::default();
        store.fail_uploads_matching("800w");
        let err = store
            .upload("b", "x-800w.avif", vec![], UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_writer_wins() {
        let cache = MemoryCacheStore::new();
        let fp = Fingerprint::from_hex("0123456789abcdef").unwrap();
        assert!(cache.set(&fp, &record(&fp, "first")).await.unwrap());
        assert!(!cache.set(&fp, &record(&fp, "second")).await.unwrap());
        assert_eq!(cache.get(&fp).await.unwrap().unwrap().lqip, "first");
        assert_eq!(cache.rejected_write_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_error_log_appends() {
        let log = MemoryErrorLog::new();
        log.append(ErrorRecord {
            file_path: "products/a.jpg".into(),
            error: "bad".into(),
            stack: "bad".into(),
            stage: "enhancing".into(),
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].stage, "enhancing");
    }
}
