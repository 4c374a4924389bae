// Media transfer: download a recording to a scratch file, then upload it

use crate::errors::SyncError;
use crate::storage::ObjectStore;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument, warn};

/// Moves one media resource from a URL into the object store
#[async_trait]
pub trait MediaTransfer: Send + Sync {
    /// Fetch `source_url` and store it at `bucket/key`.
    ///
    /// Either the object is fully stored, or an error is returned. No local
    /// file is left behind in either case.
    async fn transfer(&self, source_url: &Url, bucket: &str, key: &str) -> Result<(), SyncError>;
}

/// Append the media API key to a recording URL as a query parameter
pub fn authorized_url(recording_url: &str, param: &str, api_key: &str) -> Result<Url, SyncError> {
    let mut url = Url::parse(recording_url)
        .map_err(|e| SyncError::Fetch(format!("Invalid recording URL: {}", e)))?;
    url.query_pairs_mut().append_pair(param, api_key);
    Ok(url)
}

/// URL without its query string, safe to log
pub fn redacted_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// HTTP download into a per-transfer scratch file followed by an upload
pub struct HttpMediaTransfer {
    client: Client,
    store: Arc<dyn ObjectStore>,
    scratch_dir: PathBuf,
}

impl HttpMediaTransfer {
    /// Create a new HttpMediaTransfer with the specified request timeout
    pub fn new(
        store: Arc<dyn ObjectStore>,
        scratch_dir: impl Into<PathBuf>,
        timeout_seconds: u64,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SyncError::Fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            store,
            scratch_dir: scratch_dir.into(),
        })
    }

    /// Stream the response body into `path`, synced to disk before returning
    async fn download(&self, source_url: &Url, path: &Path) -> Result<u64, SyncError> {
        let mut response = self
            .client
            .get(source_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| SyncError::Fetch(format!("Failed to open scratch file: {}", e)))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::Fetch(format!("Failed to write scratch file: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| SyncError::Fetch(format!("Failed to flush scratch file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| SyncError::Fetch(format!("Failed to sync scratch file: {}", e)))?;

        Ok(written)
    }

    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<(), SyncError> {
        self.store.put_file(bucket, key, path).await
    }
}

#[async_trait]
impl MediaTransfer for HttpMediaTransfer {
    #[instrument(skip(self, source_url), fields(source = %redacted_url(source_url)))]
    async fn transfer(&self, source_url: &Url, bucket: &str, key: &str) -> Result<(), SyncError> {
        let scratch = tempfile::Builder::new()
            .prefix("recording-")
            .suffix(".part")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| SyncError::Fetch(format!("Failed to create scratch file: {}", e)))?;

        let result = async {
            let size = self.download(source_url, scratch.path()).await.map_err(|e| {
                error!(error = %e, "Error downloading recording");
                e
            })?;
            debug!(size = size, path = %scratch.path().display(), "Recording downloaded");

            self.upload(scratch.path(), bucket, key).await.map_err(|e| {
                error!(error = %e, "Error uploading recording");
                e
            })
        }
        .await;

        // Dropping the handle would also remove the file; close() reports failures
        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch file");
        }

        result
    }
}
