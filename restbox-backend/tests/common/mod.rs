use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use restbox_backend::{BackendResult, DeleteStatus, Format, Storage};

/// In-memory storage recording the TTL of each write.
#[derive(Clone, Debug, Default)]
pub struct TestStorage {
    store: Arc<DashMap<String, (Bytes, Option<Duration>)>>,
    format: Format,
}

impl TestStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: Format) -> Self {
        Self {
            store: Arc::default(),
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.store.get(key).and_then(|entry| entry.1)
    }
}

#[async_trait]
impl Storage for TestStorage {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        Ok(self.store.get(key).map(|entry| entry.0.clone()))
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        self.store.insert(key.to_owned(), (value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        match self.store.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        Ok(self
            .store
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    fn name(&self) -> &str {
        "test"
    }

    fn value_format(&self) -> Format {
        self.format
    }
}
