use async_trait::async_trait;
use restbox_backend::StorageCacheManager;
use restbox_core::{
    BulkCacheOperations, CacheManager, CacheRequest, CacheResult, MatchOptions, StoredResponse,
};

use crate::error::Error;
use crate::storage::{ConnectionMode, RedisStorage};

/// Cache manager storing entries in Redis.
///
/// Behaves like any [`StorageCacheManager`] and adds [`quit`](Self::quit) to
/// close the connection on shutdown.
#[derive(Clone, Debug)]
pub struct RedisCacheManager {
    inner: StorageCacheManager<RedisStorage>,
}

impl RedisCacheManager {
    /// Wraps a configured storage manager.
    pub fn new(inner: StorageCacheManager<RedisStorage>) -> Self {
        Self { inner }
    }

    /// Creates a manager with default settings for `mode`.
    pub fn connect(mode: ConnectionMode) -> Result<Self, Error> {
        let storage = RedisStorage::builder().connection(mode).build()?;
        Ok(Self::new(StorageCacheManager::new(storage)))
    }

    /// The wrapped storage manager.
    pub fn inner(&self) -> &StorageCacheManager<RedisStorage> {
        &self.inner
    }

    /// Closes the connection. Returns `true` when the server acknowledged it.
    pub async fn quit(&self) -> Result<bool, Error> {
        self.inner.storage().quit().await
    }
}

impl From<StorageCacheManager<RedisStorage>> for RedisCacheManager {
    fn from(inner: StorageCacheManager<RedisStorage>) -> Self {
        Self::new(inner)
    }
}

#[async_trait]
impl CacheManager for RedisCacheManager {
    async fn match_request(
        &self,
        request: &CacheRequest,
        options: MatchOptions,
    ) -> CacheResult<Option<StoredResponse>> {
        self.inner.match_request(request, options).await
    }

    async fn put(&self, request: &CacheRequest, response: StoredResponse) -> CacheResult<()> {
        self.inner.put(request, response).await
    }

    async fn delete(&self, request: &CacheRequest, options: MatchOptions) -> CacheResult<bool> {
        self.inner.delete(request, options).await
    }

    fn bulk(&self) -> Option<&dyn BulkCacheOperations> {
        self.inner.bulk()
    }

    fn describe(&self) -> serde_json::Value {
        self.inner.describe()
    }
}
