use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BackendError, DeleteStatus, format::Format};

pub type BackendResult<T> = Result<T, BackendError>;

/// Raw key-value store behind a [`StorageCacheManager`](crate::StorageCacheManager).
///
/// Keys are strings, values are opaque bytes encoded with
/// [`Storage::value_format`].
#[async_trait]
pub trait Storage: Sync + Send {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>>;

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()>;

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus>;

    /// Lists stored keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>>;

    /// Returns the name of this storage, used in logs.
    fn name(&self) -> &str {
        "storage"
    }

    fn value_format(&self) -> Format {
        Format::Json
    }

    /// Log-safe description of the storage and its settings.
    fn describe(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name() })
    }
}

#[async_trait]
impl Storage for &dyn Storage {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (*self).read(key).await
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (*self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        (*self).remove(key).await
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        (*self).keys(prefix).await
    }

    fn name(&self) -> &str {
        (*self).name()
    }

    fn value_format(&self) -> Format {
        (*self).value_format()
    }

    fn describe(&self) -> serde_json::Value {
        (*self).describe()
    }
}

#[async_trait]
impl Storage for Box<dyn Storage> {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        (**self).keys(prefix).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn value_format(&self) -> Format {
        (**self).value_format()
    }

    fn describe(&self) -> serde_json::Value {
        (**self).describe()
    }
}

#[async_trait]
impl Storage for Arc<dyn Storage + Send + 'static> {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        (**self).remove(key).await
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        (**self).keys(prefix).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn value_format(&self) -> Format {
        (**self).value_format()
    }

    fn describe(&self) -> serde_json::Value {
        (**self).describe()
    }
}
