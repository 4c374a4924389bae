// In-memory collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use common::errors::SyncError;
use common::models::WorkItem;
use common::secrets::{SecretStore, SecretValue};
use common::storage::ObjectStore;
use common::transfer::MediaTransfer;
use common::warehouse::{WarehouseConnector, WarehouseCredentials, WorkQueue};
use futures::stream::{BoxStream, StreamExt};
use reqwest::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn work_items(n: usize) -> Vec<WorkItem> {
    (1..=n)
        .map(|i| WorkItem {
            call_id: format!("{:06}", i),
            recording_url: format!("https://media.example.com/recordings/{}", i),
            file_name: format!("call-{}.mp3", i),
            folder: "2023/10".to_string(),
            date_started: None,
        })
        .collect()
}

/// Object store keeping objects in memory, optionally failing every put
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail: AtomicBool,
}

impl MemoryObjectStore {
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), SyncError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Store("503 Slow Down".to_string()));
        }
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to read '{}': {}", path.display(), e)))?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, key), data);
        Ok(())
    }
}

/// Secret store answering from a fixed map; unknown names are access errors
#[derive(Default)]
pub struct StaticSecretStore {
    pub values: HashMap<String, SecretValue>,
    pub calls: AtomicUsize,
}

impl StaticSecretStore {
    pub fn with_text(mut self, name: &str, text: &str) -> Self {
        self.values.insert(
            name.to_string(),
            SecretValue {
                secret_string: Some(text.to_string()),
                secret_binary: None,
            },
        );
        self
    }

    pub fn with_binary(mut self, name: &str, bytes: &[u8]) -> Self {
        self.values.insert(
            name.to_string(),
            SecretValue {
                secret_string: None,
                secret_binary: Some(bytes.to_vec()),
            },
        );
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret_value(&self, name: &str) -> Result<SecretValue, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::SecretAccess {
                name: name.to_string(),
                reason: "ResourceNotFoundException".to_string(),
            })
    }
}

/// Warehouse serving a fixed list of rows and recording session lifecycle
#[derive(Default)]
pub struct MemoryWarehouse {
    pub rows: Mutex<Vec<Result<WorkItem, SyncError>>>,
    pub connect_error: Option<String>,
    /// Tokio time spent opening each session
    pub connect_delay: Option<Duration>,
    pub connects: AtomicUsize,
    pub closed: Arc<AtomicBool>,
    pub last_credentials: Mutex<Option<WarehouseCredentials>>,
}

impl MemoryWarehouse {
    pub fn with_items(items: Vec<WorkItem>) -> Self {
        Self {
            rows: Mutex::new(items.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarehouseConnector for MemoryWarehouse {
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
    ) -> Result<Box<dyn WorkQueue>, SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.connect_error {
            return Err(SyncError::Query(reason.clone()));
        }
        *self.last_credentials.lock().unwrap() = Some(credentials.clone());

        Ok(Box::new(MemoryWorkQueue {
            rows: std::mem::take(&mut *self.rows.lock().unwrap()),
            closed: self.closed.clone(),
        }))
    }
}

pub struct MemoryWorkQueue {
    rows: Vec<Result<WorkItem, SyncError>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    fn pending_batch(&mut self, max_count: u32) -> BoxStream<'_, Result<WorkItem, SyncError>> {
        let rows: Vec<_> = std::mem::take(&mut self.rows)
            .into_iter()
            .take(max_count as usize)
            .collect();
        futures::stream::iter(rows).boxed()
    }

    async fn close(self: Box<Self>) -> Result<(), SyncError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transfer that takes `per_item` of (tokio) time and fails on the
/// 1-based call index `fail_on`
#[derive(Default)]
pub struct SleepingTransfer {
    pub per_item: Duration,
    pub fail_on: Option<usize>,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
    pub keys: Mutex<Vec<String>>,
}

impl SleepingTransfer {
    pub fn new(per_item: Duration) -> Self {
        Self {
            per_item,
            ..Default::default()
        }
    }

    pub fn failing_on(per_item: Duration, call: usize) -> Self {
        Self {
            per_item,
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTransfer for SleepingTransfer {
    async fn transfer(&self, source_url: &Url, _bucket: &str, key: &str) -> Result<(), SyncError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.urls.lock().unwrap().push(source_url.to_string());
        tokio::time::sleep(self.per_item).await;

        if self.fail_on == Some(call) {
            return Err(SyncError::Fetch("HTTP status client error (404 Not Found)".to_string()));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
