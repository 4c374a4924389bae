// S3 object store client built on rust-s3

use super::ObjectStore;
use crate::config::ObjectStoreConfig;
use crate::errors::SyncError;
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// Stateless S3 client; a bucket handle is built per upload
#[derive(Clone)]
pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3ObjectStore {
    /// Create a new S3 client from configuration.
    ///
    /// Static keys are used when configured, otherwise the ambient credential
    /// chain (environment, profile, instance metadata).
    #[instrument(skip(config), fields(region = %config.region, endpoint = ?config.endpoint))]
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, SyncError> {
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            }
            _ => Credentials::default(),
        }
        .map_err(|e| {
            error!(error = %e, "Failed to resolve object store credentials");
            SyncError::Store(format!("Failed to create credentials: {}", e))
        })?;

        let region = Self::region(config);

        info!(region = %config.region, "Object store client initialized");

        Ok(Self {
            region,
            credentials,
            path_style: config.path_style,
        })
    }

    fn region(config: &ObjectStoreConfig) -> Region {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region));

        Region::Custom {
            region: config.region.clone(),
            endpoint,
        }
    }

    fn bucket(&self, name: &str) -> Result<Bucket, SyncError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone()).map_err(
            |e| {
                error!(error = %e, bucket = name, "Failed to create bucket handle");
                SyncError::Store(format!("Failed to create bucket '{}': {}", name, e))
            },
        )?;

        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, path))]
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError> {
        debug!("Streaming object");

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to open '{}': {}", path.display(), e)))?;

        let response = self
            .bucket(bucket)?
            .put_object_stream(&mut file, key)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to store object");
                SyncError::Store(format!("Failed to put object '{}/{}': {}", bucket, key, e))
            })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            error!(status = status, "Object store rejected upload");
            return Err(SyncError::Store(format!(
                "Put object '{}/{}' returned status {}",
                bucket, key, status
            )));
        }

        info!(
            size = response.uploaded_bytes(),
            "Recording uploaded to s3://{}/{}",
            bucket,
            key
        );
        Ok(())
    }
}
