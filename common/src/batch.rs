// Batch controller: time-boxed sequential transfer of pending recordings
//
// A run walks the pending stream in order, transfers each recording and
// collects a completion record per success. Iteration stops early once the
// wall-clock cutoff is exceeded so the host's hard limit is never reached.
// Early stop and failure are separate outcomes: a stopped batch still carries
// its records, a failed one carries none.

use crate::config::{BatchConfig, FailurePolicy};
use crate::errors::SyncError;
use crate::models::{CompletionRecord, WorkItem};
use crate::telemetry;
use crate::transfer::{authorized_url, MediaTransfer};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Parameters of one batch run
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Destination bucket for every recording
    pub bucket: String,
    /// Query parameter carrying the media API key
    pub api_key_param: String,
    /// Elapsed time after which no further item is started
    pub cutoff: Duration,
    pub failure_policy: FailurePolicy,
}

impl BatchSettings {
    pub fn from_config(config: &BatchConfig, bucket: &str, api_key_param: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            api_key_param: api_key_param.to_string(),
            cutoff: Duration::from_secs(config.cutoff_seconds),
            failure_policy: config.on_item_failure,
        }
    }
}

/// Why a completed batch stopped iterating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every item of the batch was processed
    Exhausted,
    /// The cutoff was exceeded after the last reported item
    CutoffReached,
    /// An item failed under [`FailurePolicy::KeepCompleted`]
    StoppedOnFailure { call_id: String, reason: String },
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Exhausted => "exhausted",
            Termination::CutoffReached => "cutoff_reached",
            Termination::StoppedOnFailure { .. } => "stopped_on_failure",
        }
    }
}

/// Records gathered by a batch that ran to a normal stop
#[derive(Debug, Clone)]
pub struct CompletedBatch {
    pub records: Vec<CompletionRecord>,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Result of a batch run
#[derive(Debug)]
pub enum BatchOutcome {
    /// Normal stop, possibly early, carrying the records gathered so far
    Completed(CompletedBatch),
    /// Fatal error; every record of the run is discarded
    Failed(SyncError),
}

/// Drives the per-item transfers of one run
pub struct BatchController {
    transfer: Arc<dyn MediaTransfer>,
    settings: BatchSettings,
}

impl BatchController {
    pub fn new(transfer: Arc<dyn MediaTransfer>, settings: BatchSettings) -> Self {
        Self { transfer, settings }
    }

    /// Process `items` in stream order until exhausted, cut off, or failed.
    ///
    /// The cutoff is measured from `started`, the beginning of the invocation,
    /// so time spent before the first item counts against it.
    #[instrument(skip_all, fields(bucket = %self.settings.bucket, cutoff_seconds = self.settings.cutoff.as_secs()))]
    pub async fn run<S>(&self, mut items: S, api_key: &str, started: Instant) -> BatchOutcome
    where
        S: Stream<Item = Result<WorkItem, SyncError>> + Unpin,
    {
        let mut records = Vec::new();

        while let Some(next) = items.next().await {
            // Warehouse errors end the run under every policy
            let item = match next {
                Ok(item) => item,
                Err(e) => return self.fail(e, records.len(), started),
            };

            match self.process(&item, api_key).await {
                Ok(record) => records.push(record),
                Err(e) => match self.settings.failure_policy {
                    FailurePolicy::AbortBatch => return self.fail(e, records.len(), started),
                    FailurePolicy::KeepCompleted => {
                        warn!(
                            call_id = %item.call_id,
                            error = %e,
                            completed = records.len(),
                            "Transfer failed, reporting the records completed so far"
                        );
                        let termination = Termination::StoppedOnFailure {
                            call_id: item.call_id.clone(),
                            reason: e.to_string(),
                        };
                        return self.complete(records, termination, started);
                    }
                },
            }

            let elapsed = started.elapsed();
            if elapsed > self.settings.cutoff {
                info!(
                    elapsed_seconds = elapsed.as_secs(),
                    completed = records.len(),
                    "Run time exceeded the cutoff, stopping to stay inside the execution limit"
                );
                return self.complete(records, Termination::CutoffReached, started);
            }
        }

        self.complete(records, Termination::Exhausted, started)
    }

    async fn process(&self, item: &WorkItem, api_key: &str) -> Result<CompletionRecord, SyncError> {
        tracing::debug!(call_id = %item.call_id, file_name = %item.file_name, "Processing recording");

        let key = item.object_key();
        let result = match authorized_url(&item.recording_url, &self.settings.api_key_param, api_key) {
            Ok(source_url) => {
                self.transfer
                    .transfer(&source_url, &self.settings.bucket, &key)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                telemetry::record_item_transferred(&self.settings.bucket);
                Ok(CompletionRecord::completed(item, Utc::now()))
            }
            Err(e) => {
                telemetry::record_item_failed(e.kind());
                error!(call_id = %item.call_id, key = %key, error = %e, "Error transferring recording");
                Err(e)
            }
        }
    }

    fn complete(
        &self,
        records: Vec<CompletionRecord>,
        termination: Termination,
        started: Instant,
    ) -> BatchOutcome {
        let elapsed = started.elapsed();
        telemetry::record_batch_finished(termination.label(), elapsed.as_secs_f64());
        info!(
            completed = records.len(),
            termination = termination.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch completed"
        );

        BatchOutcome::Completed(CompletedBatch {
            records,
            termination,
            elapsed,
        })
    }

    fn fail(&self, error: SyncError, discarded: usize, started: Instant) -> BatchOutcome {
        let elapsed = started.elapsed();
        telemetry::record_batch_finished("failed", elapsed.as_secs_f64());
        error!(
            error = %error,
            kind = error.kind(),
            discarded = discarded,
            "Batch failed, discarding completion records of this run"
        );

        BatchOutcome::Failed(error)
    }
}
