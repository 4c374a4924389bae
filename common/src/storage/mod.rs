// Object storage for transferred recordings

pub mod s3;

use crate::errors::SyncError;
use async_trait::async_trait;
use std::path::Path;

pub use s3::S3ObjectStore;

/// S3-compatible object store with overwrite semantics
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream the file at `path` to `bucket/key`, replacing any existing object
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError>;
}
