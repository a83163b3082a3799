//! Filesystem-backed collaborators.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<bucket>/<path>              object bytes
//! <root>/.meta/<bucket>/<path>.json   content type, cache control, custom metadata
//! <root>/.cache/<fingerprint>.json    cache records
//! <root>/errors.jsonl                 error log
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{CacheStore, ErrorLog, ObjectStore, StoreResult, UploadOptions};
use crate::error::StoreError;
use crate::pipeline::hash::Fingerprint;
use crate::types::{CacheRecord, CustomMetadata, ErrorRecord};

const META_DIR: &str = ".meta";
const CACHE_DIR: &str = ".cache";
const ERROR_LOG_FILE: &str = "errors.jsonl";

/// Sidecar document stored next to every object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub metadata: CustomMetadata,
}

/// Object store where each bucket is a directory under the root.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalObjectStore {
    /// Objects are addressed as `{public_base_url}/{bucket}/{path}` when a
    /// base URL is given, otherwise as `file://` URLs.
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of an object.
    pub fn object_path(&self, bucket: &str, path: &str) -> StoreResult<PathBuf> {
        validate_key(bucket)?;
        validate_key(path)?;
        Ok(self.root.join(bucket).join(path))
    }

    fn meta_path(&self, bucket: &str, path: &str) -> StoreResult<PathBuf> {
        validate_key(bucket)?;
        validate_key(path)?;
        Ok(self
            .root
            .join(META_DIR)
            .join(bucket)
            .join(format!("{}.json", path)))
    }

    /// Read an object's sidecar; a missing sidecar yields defaults.
    pub async fn read_meta(&self, bucket: &str, path: &str) -> StoreResult<ObjectMeta> {
        let meta_path = self.meta_path(bucket, path)?;
        match fs::read(&meta_path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectMeta::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, bucket: &str, path: &str, meta: &ObjectMeta) -> StoreResult<()> {
        let meta_path = self.meta_path(bucket, path)?;
        ensure_parent_dir(&meta_path).await?;
        fs::write(&meta_path, serde_json::to_vec_pretty(meta)?).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str, file: &Path) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base, bucket, path),
            None => {
                let absolute = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
                format!("file://{}", absolute.display())
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>> {
        let file = self.object_path(bucket, path)?;
        match fs::read(&file).await {
            Ok(data) => {
                tracing::trace!(path = %file.display(), bytes = data.len(), "Read object");
                Ok(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<String> {
        let file = self.object_path(bucket, path)?;
        ensure_parent_dir(&file).await?;

        let size = data.len();
        let mut handle = fs::File::create(&file).await?;
        handle.write_all(&data).await?;
        handle.sync_all().await?;

        self.write_meta(
            bucket,
            path,
            &ObjectMeta {
                content_type: Some(options.content_type),
                cache_control: Some(options.cache_control),
                public: options.public,
                metadata: options.custom_metadata,
            },
        )
        .await?;

        tracing::trace!(path = %file.display(), bytes = size, "Wrote object");
        Ok(self.public_url(bucket, path, &file))
    }

    async fn set_metadata(
        &self,
        bucket: &str,
        path: &str,
        metadata: CustomMetadata,
    ) -> StoreResult<()> {
        let file = self.object_path(bucket, path)?;
        if !fs::try_exists(&file).await? {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }

        let mut meta = self.read_meta(bucket, path).await?;
        meta.metadata.extend(metadata);
        self.write_meta(bucket, path, &meta).await
    }
}

/// One JSON document per fingerprint.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    dir: PathBuf,
}

impl LocalCacheStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(CACHE_DIR),
        }
    }

    pub fn record_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Option<CacheRecord>> {
        match fs::read(self.record_path(fingerprint)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The record is written to a private temp file and then hard-linked
    /// into place, so readers never see a partial document and exactly one
    /// concurrent writer wins.
    async fn set(&self, fingerprint: &Fingerprint, record: &CacheRecord) -> StoreResult<bool> {
        fs::create_dir_all(&self.dir).await?;
        let target = self.record_path(fingerprint);
        let temp = self.dir.join(format!(".{}.{}.tmp", fingerprint, unique_suffix()));

        fs::write(&temp, serde_json::to_vec_pretty(record)?).await?;
        let linked = fs::hard_link(&temp, &target).await;
        let _ = fs::remove_file(&temp).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Append-only JSON lines file.
#[derive(Debug, Clone)]
pub struct LocalErrorLog {
    path: PathBuf,
}

impl LocalErrorLog {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(ERROR_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ErrorLog for LocalErrorLog {
    async fn append(&self, record: ErrorRecord) -> StoreResult<()> {
        ensure_parent_dir(&self.path).await?;
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Reject keys that could escape the store root.
fn validate_key(key: &str) -> StoreResult<()> {
    let escapes = key.is_empty()
        || key.starts_with('/')
        || key.starts_with('\\')
        || key.split(['/', '\\']).any(|segment| segment == "..");
    if escapes {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

async fn ensure_parent_dir(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp-file suffix unique across processes and across writers within one.
fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", std::process::id(), nanos, seq)
}
