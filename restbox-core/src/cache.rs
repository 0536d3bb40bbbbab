//! Cache manager capability traits.
//!
//! A cache manager is the storage the fetch layer consults before going to the
//! network and updates after a cacheable response arrives. The fetch layer owns
//! the HTTP caching rules (freshness, validation); a cache manager only has to
//! be a correct store.
//!
//! Three operations are required: [`CacheManager::match_request`],
//! [`CacheManager::put`] and [`CacheManager::delete`]. Stores that can do more
//! advertise it by returning `Some` from [`CacheManager::bulk`].

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::request::CacheRequest;
use crate::response::StoredResponse;

/// Relaxations applied when matching a request against stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Match entries regardless of the request method.
    ///
    /// Without it only `GET` and `HEAD` requests match anything.
    #[serde(default)]
    pub ignore_method: bool,
    /// Compare URLs without their query string.
    #[serde(default)]
    pub ignore_search: bool,
    /// Skip the comparison of headers named by the stored `Vary` header.
    #[serde(default)]
    pub ignore_vary: bool,
}

impl MatchOptions {
    /// Strict matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`MatchOptions::ignore_method`].
    pub fn ignore_method(mut self, value: bool) -> Self {
        self.ignore_method = value;
        self
    }

    /// Sets [`MatchOptions::ignore_search`].
    pub fn ignore_search(mut self, value: bool) -> Self {
        self.ignore_search = value;
        self
    }

    /// Sets [`MatchOptions::ignore_vary`].
    pub fn ignore_vary(mut self, value: bool) -> Self {
        self.ignore_vary = value;
        self
    }
}

/// Storage consulted by the fetch layer for cached responses.
///
/// One instance is shared by every call of a client, possibly concurrently.
/// Concurrent writes for the same request only need last-write-wins semantics.
#[async_trait]
pub trait CacheManager: Send + Sync + Debug {
    /// Returns the stored response for `request`, if any.
    async fn match_request(
        &self,
        request: &CacheRequest,
        options: MatchOptions,
    ) -> CacheResult<Option<StoredResponse>>;

    /// Stores `response` for `request`, overwriting a previous entry.
    async fn put(&self, request: &CacheRequest, response: StoredResponse) -> CacheResult<()>;

    /// Removes entries matching `request`. Returns `true` when something was removed.
    async fn delete(&self, request: &CacheRequest, options: MatchOptions) -> CacheResult<bool>;

    /// Optional bulk operations, `None` when the store does not offer them.
    fn bulk(&self) -> Option<&dyn BulkCacheOperations> {
        None
    }

    /// Log-safe description of the manager.
    ///
    /// Used when fetch options are written to debug logs. Implementations
    /// holding live connections must redact them here.
    fn describe(&self) -> serde_json::Value {
        serde_json::Value::String(std::any::type_name::<Self>().to_owned())
    }
}

/// Optional operations layered on the required ones.
#[async_trait]
pub trait BulkCacheOperations: Send + Sync {
    /// Returns every stored response matching `request`, or all of them when
    /// `request` is `None`.
    async fn match_all(
        &self,
        request: Option<&CacheRequest>,
        options: MatchOptions,
    ) -> CacheResult<Vec<StoredResponse>>;

    /// Stores a successful response. Non-2xx responses are rejected.
    async fn add(&self, request: &CacheRequest, response: StoredResponse) -> CacheResult<()>;

    /// Stores several successful responses.
    ///
    /// Nothing is stored when any response is not successful.
    async fn add_all(&self, entries: Vec<(CacheRequest, StoredResponse)>) -> CacheResult<()>;

    /// Returns the requests of stored entries matching `request`, or all of
    /// them when `request` is `None`.
    async fn keys(
        &self,
        request: Option<&CacheRequest>,
        options: MatchOptions,
    ) -> CacheResult<Vec<CacheRequest>>;
}
