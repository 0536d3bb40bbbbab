//! Moka storage implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use restbox_backend::{BackendResult, DeleteStatus, Format, Storage};

use crate::builder::{MokaStorageBuilder, NoCapacity};

/// Value kept in the Moka cache together with its time to live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBytes {
    /// Encoded records.
    pub data: Bytes,
    /// Time to live, `None` keeps the entry until it is evicted.
    pub ttl: Option<Duration>,
}

/// In-memory storage powered by Moka.
///
/// # Caveats
///
/// - Data is **not persisted**, the cache is lost on process restart
/// - Data is **not shared** across processes, use Redis for a shared cache
/// - Eviction is applied by Moka's maintenance tasks; call
///   [`run_pending_tasks`](MokaStorage::run_pending_tasks) to apply it now
#[derive(Clone)]
pub struct MokaStorage {
    pub(crate) cache: Cache<String, StoredBytes>,
    pub(crate) format: Format,
    pub(crate) label: String,
}

impl std::fmt::Debug for MokaStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStorage")
            .field("label", &self.label)
            .field("cache", &self.cache)
            .field("format", &self.format)
            .finish()
    }
}

impl MokaStorage {
    /// Creates a new builder for `MokaStorage`.
    pub fn builder() -> MokaStorageBuilder<NoCapacity> {
        MokaStorageBuilder::new()
    }

    /// The underlying Moka cache.
    pub fn cache(&self) -> &Cache<String, StoredBytes> {
        &self.cache
    }

    /// Applies pending evictions and expirations.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Approximate number of stored keys.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl Storage for MokaStorage {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        Ok(self.cache.get(key).await.map(|stored| stored.data))
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        self.cache
            .insert(key.to_owned(), StoredBytes { data: value, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        match self.cache.remove(key).await {
            Some(_) => Ok(DeleteStatus::Deleted),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        Ok(self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| String::clone(&key))
            .collect())
    }

    fn name(&self) -> &str {
        &self.label
    }

    fn value_format(&self) -> Format {
        self.format
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.label,
            "maxCapacity": self.cache.policy().max_capacity(),
        })
    }
}
