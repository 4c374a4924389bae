// Error handling framework

use thiserror::Error;

/// Errors raised while synchronizing recordings.
///
/// None of these are retried within a run: any of them aborts the invocation
/// and is handed back to the scheduler.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to access secret '{name}': {reason}")]
    SecretAccess { name: String, reason: String },

    #[error("Secret '{name}' has an unexpected format: {reason}")]
    SecretFormat { name: String, reason: String },

    #[error("Warehouse query failed: {0}")]
    Query(String),

    #[error("Media fetch failed: {0}")]
    Fetch(String),

    #[error("Object store upload failed: {0}")]
    Store(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::SecretAccess { .. } => "secret_access",
            SyncError::SecretFormat { .. } => "secret_format",
            SyncError::Query(_) => "query",
            SyncError::Fetch(_) => "fetch",
            SyncError::Store(_) => "store",
            SyncError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => SyncError::Query(db_err.message().to_string()),
            _ => SyncError::Query(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL so the appended API key never reaches logs
        SyncError::Fetch(err.without_url().to_string())
    }
}
