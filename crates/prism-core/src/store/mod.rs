//! Collaborator interfaces: object storage, the variant cache and the error log.
//!
//! The pipeline only talks to these traits. Two families of implementations
//! ship with the crate:
//!
//! - [`memory`]: in-process stores with inspection helpers, for tests and
//!   embedders that bring their own persistence.
//! - [`local`]: a filesystem layout where a bucket is a directory.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::pipeline::hash::Fingerprint;
use crate::types::{CacheRecord, CustomMetadata, ErrorRecord};

pub use local::{LocalCacheStore, LocalErrorLog, LocalObjectStore};
pub use memory::{MemoryCacheStore, MemoryErrorLog, MemoryObjectStore};

/// Result type for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Options for a single object upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub content_type: String,
    /// Full `Cache-Control` header value
    pub cache_control: String,
    pub custom_metadata: CustomMetadata,
    /// Make the object publicly readable
    pub public: bool,
}

/// Blob storage holding originals and published variants.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes.
    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Vec<u8>>;

    /// Store an object and return its durable public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StoreResult<String>;

    /// Merge custom metadata into an existing object.
    async fn set_metadata(
        &self,
        bucket: &str,
        path: &str,
        metadata: CustomMetadata,
    ) -> StoreResult<()>;
}

/// Fingerprint-keyed store of finished variant sets.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Option<CacheRecord>>;

    /// Write a record if none exists yet.
    ///
    /// Returns `false` when another writer got there first; the existing
    /// record is left untouched.
    async fn set(&self, fingerprint: &Fingerprint, record: &CacheRecord) -> StoreResult<bool>;
}

/// Append-only sink for contained pipeline failures.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    async fn append(&self, record: ErrorRecord) -> StoreResult<()>;
}
