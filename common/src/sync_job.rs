// One invocation: credentials → warehouse session → batch → response

use crate::batch::{BatchController, BatchOutcome, BatchSettings};
use crate::config::Settings;
use crate::errors::SyncError;
use crate::models::{SyncRequest, SyncResponse};
use crate::report::ProgressReporter;
use crate::secrets::SecretProvider;
use crate::transfer::MediaTransfer;
use crate::warehouse::{WarehouseConnector, WarehouseCredentials};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Runs a single sync invocation against its collaborators
pub struct SyncJob {
    settings: Settings,
    secrets: SecretProvider,
    warehouse: Arc<dyn WarehouseConnector>,
    transfer: Arc<dyn MediaTransfer>,
}

impl SyncJob {
    pub fn new(
        settings: Settings,
        secrets: SecretProvider,
        warehouse: Arc<dyn WarehouseConnector>,
        transfer: Arc<dyn MediaTransfer>,
    ) -> Self {
        Self {
            settings,
            secrets,
            warehouse,
            transfer,
        }
    }

    /// Execute one invocation.
    ///
    /// Any error aborts the run and no completion records are returned. The
    /// warehouse session is closed whether the batch completed or failed.
    /// The batch cutoff counts from the start of this call.
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self, request: SyncRequest) -> Result<SyncResponse, SyncError> {
        let started = Instant::now();
        info!(
            previous_state = ?request.state.uploaded_to_s3_datetime,
            "Starting recording sync"
        );

        if request.secrets.user.is_empty() || request.secrets.account.is_empty() {
            return Err(SyncError::InvalidRequest(
                "secrets.user and secrets.account are required".to_string(),
            ));
        }

        let api_key = self.media_api_key(&request).await?;
        let password = self
            .secrets
            .fetch_json_field(
                &self.settings.secrets.warehouse_password_secret,
                &self.settings.secrets.warehouse_password_field,
            )
            .await?;

        let credentials = WarehouseCredentials {
            user: request.secrets.user.clone(),
            account: request.secrets.account.clone(),
            password,
        };

        let mut queue = self.warehouse.connect(&credentials).await?;

        let controller = BatchController::new(
            self.transfer.clone(),
            BatchSettings::from_config(
                &self.settings.batch,
                &self.settings.object_store.bucket,
                &self.settings.media.api_key_param,
            ),
        );

        let outcome = {
            let items = queue.pending_batch(self.settings.batch.max_items);
            controller.run(items, &api_key, started).await
        };

        if let Err(e) = queue.close().await {
            warn!(error = %e, "Warehouse session did not close cleanly");
        }

        match outcome {
            BatchOutcome::Completed(batch) => {
                let reporter = ProgressReporter::new(
                    self.settings.output.table_name.as_str(),
                    self.settings.batch.has_more,
                    self.settings.batch.max_items,
                );
                let response = reporter.build(batch, &request.state, Utc::now());

                debug!(
                    has_more = response.has_more,
                    records = response.records(&self.settings.output.table_name).len(),
                    state = ?response.state.uploaded_to_s3_datetime,
                    "Sync response assembled"
                );
                Ok(response)
            }
            BatchOutcome::Failed(e) => {
                error!(error = %e, kind = e.kind(), "Recording sync failed");
                Err(e)
            }
        }
    }

    /// Media API key from the secret store, or from the request when no
    /// secret is configured
    async fn media_api_key(&self, request: &SyncRequest) -> Result<String, SyncError> {
        match &self.settings.secrets.media_api_key_secret {
            Some(secret) => {
                self.secrets
                    .fetch_json_field(secret, &self.settings.secrets.media_api_key_field)
                    .await
            }
            None if !request.secrets.api_key.is_empty() => Ok(request.secrets.api_key.clone()),
            None => Err(SyncError::InvalidRequest(
                "secrets.api_key is required when no media API key secret is configured"
                    .to_string(),
            )),
        }
    }
}
