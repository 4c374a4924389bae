// PostgreSQL-compatible warehouse session

use super::queries;
use super::{WarehouseConnector, WarehouseCredentials, WorkQueue};
use crate::config::WarehouseConfig;
use crate::errors::SyncError;
use crate::models::WorkItem;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::time::Duration;
use tracing::{info, instrument};

/// Opens one dedicated connection per run
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    config: WarehouseConfig,
}

impl PgWarehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self { config }
    }

    /// Connection options for `credentials`.
    /// The account doubles as the host name when no host is configured.
    fn connect_options(&self, credentials: &WarehouseCredentials) -> PgConnectOptions {
        let host = self
            .config
            .host
            .as_deref()
            .unwrap_or(credentials.account.as_str());

        PgConnectOptions::new()
            .host(host)
            .port(self.config.port)
            .username(&credentials.user)
            .password(&credentials.password)
            .database(&self.config.database)
    }
}

#[async_trait]
impl WarehouseConnector for PgWarehouse {
    #[instrument(skip(self), fields(database = %self.config.database, table = %self.config.table))]
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<Box<dyn WorkQueue>, SyncError> {
        info!("Opening warehouse session");

        let options = self.connect_options(credentials);
        let timeout = Duration::from_secs(self.config.connect_timeout_seconds);

        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                tracing::error!(timeout_seconds = timeout.as_secs(), "Warehouse connection timed out");
                SyncError::Query(format!(
                    "connection timed out after {} seconds",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to warehouse");
                SyncError::Query(format!("connection failed: {}", e))
            })?;

        info!("Warehouse session opened");
        Ok(Box::new(PgWorkQueue {
            conn,
            select_sql: queries::pending_items(&self.config.table),
        }))
    }
}

/// Open warehouse session over a single connection
pub struct PgWorkQueue {
    conn: PgConnection,
    select_sql: String,
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    fn pending_batch(&mut self, max_count: u32) -> BoxStream<'_, Result<WorkItem, SyncError>> {
        tracing::debug!(max_count = max_count, "Streaming pending recordings");

        sqlx::query_as::<_, WorkItem>(&self.select_sql)
            .bind(i64::from(max_count))
            .fetch(&mut self.conn)
            .map_err(SyncError::from)
            .boxed()
    }

    #[instrument(skip(self))]
    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        self.conn.close().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to close warehouse session");
            SyncError::Query(format!("failed to close session: {}", e))
        })?;

        info!("Warehouse session closed");
        Ok(())
    }
}
