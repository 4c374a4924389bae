// Warehouse access: session lifecycle and the pending work queue

pub mod postgres;
pub mod queries;

use crate::errors::SyncError;
use crate::models::WorkItem;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

pub use postgres::{PgWarehouse, PgWorkQueue};

/// Credentials for one warehouse session
#[derive(Clone)]
pub struct WarehouseCredentials {
    pub user: String,
    pub account: String,
    pub password: String,
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("user", &self.user)
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens warehouse sessions
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<Box<dyn WorkQueue>, SyncError>;
}

/// An open warehouse session exposing the pending recordings.
///
/// The session must be released with [`WorkQueue::close`] on every exit path.
#[async_trait]
pub trait WorkQueue: Send {
    /// Lazily stream at most `max_count` un-uploaded items in ascending
    /// `call_id` order. The stream is forward-only and consumed once.
    fn pending_batch(&mut self, max_count: u32) -> BoxStream<'_, Result<WorkItem, SyncError>>;

    /// Close the session
    async fn close(self: Box<Self>) -> Result<(), SyncError>;
}
