// Bootstrap utilities for binary initialization

use crate::config::Settings;
use crate::secrets::{AwsSecretStore, SecretProvider};
use crate::storage::{ObjectStore, S3ObjectStore};
use crate::sync_job::SyncJob;
use crate::telemetry;
use crate::transfer::{HttpMediaTransfer, MediaTransfer};
use crate::warehouse::{PgWarehouse, WarehouseConnector};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Initialize logging and, when configured, the metrics exporter
pub fn init_observability(settings: &Settings) -> Result<()> {
    let observability = &settings.observability;

    telemetry::init_logging(
        &observability.log_level,
        observability.logging_preconfigured,
        observability.tracing_endpoint.as_deref(),
    )
    .context("Failed to initialize logging")?;

    if let Some(port) = observability.metrics_port {
        telemetry::init_metrics(port).context("Failed to initialize metrics exporter")?;
    }

    Ok(())
}

/// Initialize the secret provider for the configured region
#[tracing::instrument(skip(settings))]
pub async fn init_secret_provider(settings: &Settings) -> SecretProvider {
    info!(region = %settings.secrets.region, "Initializing secret provider");

    let store = AwsSecretStore::new(&settings.secrets.region).await;
    SecretProvider::new(Arc::new(store))
}

/// Initialize the object store client
///
/// # Errors
/// Returns error if credentials cannot be resolved
#[tracing::instrument(skip(settings))]
pub fn init_object_store(settings: &Settings) -> Result<Arc<dyn ObjectStore>> {
    let store = S3ObjectStore::new(&settings.object_store)
        .context("Failed to initialize object store client")?;

    Ok(Arc::new(store))
}

/// Initialize the media transfer unit writing scratch files under the
/// configured directory (system temp directory by default)
///
/// # Errors
/// Returns error if the HTTP client cannot be built
#[tracing::instrument(skip(settings, store))]
pub fn init_media_transfer(
    settings: &Settings,
    store: Arc<dyn ObjectStore>,
) -> Result<Arc<dyn MediaTransfer>> {
    let scratch_dir: PathBuf = settings
        .media
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);

    info!(scratch_dir = %scratch_dir.display(), "Initializing media transfer");

    let transfer = HttpMediaTransfer::new(store, scratch_dir, settings.media.request_timeout_seconds)
        .context("Failed to initialize media transfer")?;

    Ok(Arc::new(transfer))
}

/// Wire a [`SyncJob`] with the production collaborators
///
/// # Errors
/// Returns error if any collaborator fails to initialize
pub async fn build_sync_job(settings: &Settings) -> Result<SyncJob> {
    let secrets = init_secret_provider(settings).await;
    let store = init_object_store(settings)?;
    let transfer = init_media_transfer(settings, store)?;
    let warehouse: Arc<dyn WarehouseConnector> =
        Arc::new(PgWarehouse::new(settings.warehouse.clone()));

    info!("Sync job initialized");
    Ok(SyncJob::new(settings.clone(), secrets, warehouse, transfer))
}
