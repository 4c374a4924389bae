// Progress reporter: assembles the invocation response

use crate::batch::{CompletedBatch, Termination};
use crate::config::HasMorePolicy;
use crate::models::{RunState, SyncResponse, TableSchema};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Primary key of the completion table
pub const PRIMARY_KEY: [&str; 3] = ["call_id", "uploaded_status_s3", "file_name"];

pub struct ProgressReporter {
    table: String,
    has_more_policy: HasMorePolicy,
    batch_limit: u32,
}

impl ProgressReporter {
    pub fn new(table: impl Into<String>, has_more_policy: HasMorePolicy, batch_limit: u32) -> Self {
        Self {
            table: table.into(),
            has_more_policy,
            batch_limit,
        }
    }

    /// Build the response for a completed batch, stamping the checkpoint with `now`
    pub fn build(
        &self,
        batch: CompletedBatch,
        previous: &RunState,
        now: DateTime<Utc>,
    ) -> SyncResponse {
        let has_more = self.has_more(&batch);

        let mut schema = BTreeMap::new();
        schema.insert(
            self.table.clone(),
            TableSchema {
                primary_key: PRIMARY_KEY.iter().map(|k| k.to_string()).collect(),
            },
        );

        let mut insert = BTreeMap::new();
        insert.insert(self.table.clone(), batch.records);

        SyncResponse {
            has_more,
            schema,
            state: previous.advanced_to(now),
            insert,
        }
    }

    fn has_more(&self, batch: &CompletedBatch) -> bool {
        match self.has_more_policy {
            HasMorePolicy::Never => false,
            HasMorePolicy::WhenIncomplete => {
                batch.termination != Termination::Exhausted
                    || batch.records.len() >= self.batch_limit as usize
            }
        }
    }
}
