use std::{fmt, time::Duration};

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderName, Method};
use restbox_core::{
    BulkCacheOperations, CacheError, CacheManager, CacheRequest, CacheResult, MatchOptions,
    StoredResponse,
};
use tracing::{debug, trace};

use crate::{
    BackendResult, DeleteStatus, Storage,
    key::{DEFAULT_NAMESPACE, namespace_prefix, storage_key, variant_key},
    record::{CacheRecord, StoredEntry, same_url, vary_values},
};

/// [`CacheManager`] over any [`Storage`].
///
/// Each stored request occupies its own storage key (see [`crate::key`]), so
/// a bounded storage evicts requests one by one and every write is a single
/// storage write. A response with `Vary` takes two keys: the request key
/// naming the varying headers and the variant key holding the record.
///
/// Only `GET` requests are stored.
///
/// # Examples
///
/// ```ignore
/// let manager = StorageCacheManager::new(storage)
///     .namespace("shop")
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Clone)]
pub struct StorageCacheManager<S> {
    storage: S,
    namespace: String,
    uncacheable_request_headers: Vec<HeaderName>,
    ttl: Option<Duration>,
}

impl<S> StorageCacheManager<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            uncacheable_request_headers: vec![AUTHORIZATION],
            ttl: None,
        }
    }

    /// Sets the prefix of every storage key.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Requests carrying any of these headers are never stored.
    pub fn uncacheable_request_headers(
        mut self,
        headers: impl IntoIterator<Item = HeaderName>,
    ) -> Self {
        self.uncacheable_request_headers = headers.into_iter().collect();
        self
    }

    /// Storage-level expiration for written keys.
    ///
    /// Without it entries stay until evicted or deleted, which lets the fetch
    /// layer revalidate stale responses.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    async fn read_entry(&self, key: &str) -> BackendResult<Option<StoredEntry>> {
        match self.storage.read(key).await? {
            Some(bytes) => Ok(Some(self.storage.value_format().deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_entry(&self, key: &str, entry: &StoredEntry) -> BackendResult<()> {
        let bytes = self.storage.value_format().serialize(entry)?;
        self.storage.write(key, bytes, self.ttl).await
    }

    /// Reads every entry whose key starts with `prefix`.
    async fn scan(&self, prefix: &str) -> BackendResult<Vec<(String, StoredEntry)>> {
        let mut entries = Vec::new();
        for key in self.storage.keys(prefix).await? {
            // the key may have been evicted since it was listed
            if let Some(entry) = self.read_entry(&key).await? {
                entries.push((key, entry));
            }
        }
        Ok(entries)
    }

    /// Entries answering `request`, with their storage keys.
    ///
    /// With `ignore_vary`, the request keys naming the variants are returned
    /// along with the records so that [`CacheManager::delete`] drops them too.
    async fn lookup(
        &self,
        request: &CacheRequest,
        options: MatchOptions,
    ) -> BackendResult<Vec<(String, StoredEntry)>> {
        if !options.ignore_method && request.method != Method::GET {
            return Ok(Vec::new());
        }
        let key = storage_key(&self.namespace, &Method::GET, &request.url);

        if options.ignore_search || options.ignore_vary {
            let prefix = if options.ignore_search {
                storage_key(&self.namespace, &Method::GET, request.url_without_search())
            } else {
                key
            };
            let mut entries = self.scan(&prefix).await?;
            entries.retain(|(_, entry)| match entry {
                StoredEntry::Record(record) => record.matches(request, options),
                StoredEntry::Variants { url, .. } => {
                    options.ignore_vary && same_url(url, request, options)
                }
            });
            return Ok(entries);
        }

        let (key, entry) = match self.read_entry(&key).await? {
            Some(StoredEntry::Variants { vary, .. }) => {
                let variant = variant_key(&key, &vary_values(request, &vary));
                let entry = self.read_entry(&variant).await?;
                (variant, entry)
            }
            entry => (key, entry),
        };
        match entry {
            Some(StoredEntry::Record(record)) if record.matches(request, options) => {
                Ok(vec![(key, StoredEntry::Record(record))])
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn records(
        &self,
        request: Option<&CacheRequest>,
        options: MatchOptions,
    ) -> BackendResult<Vec<CacheRecord>> {
        let entries = match request {
            Some(request) => self.lookup(request, options).await?,
            None => self.scan(&namespace_prefix(&self.namespace)).await?,
        };
        Ok(entries
            .into_iter()
            .filter_map(|(_, entry)| match entry {
                StoredEntry::Record(record) => Some(record),
                StoredEntry::Variants { .. } => None,
            })
            .collect())
    }

    fn is_uncacheable(&self, request: &CacheRequest) -> bool {
        self.uncacheable_request_headers
            .iter()
            .any(|name| request.headers.contains_key(name))
    }

    async fn store(&self, request: &CacheRequest, response: StoredResponse) -> BackendResult<()> {
        let key = storage_key(&self.namespace, &request.method, &request.url);
        let record = CacheRecord::new(request, response);
        if record.vary_headers.is_empty() {
            return self.write_entry(&key, &StoredEntry::Record(record)).await;
        }

        let variants = StoredEntry::Variants {
            url: record.url.clone(),
            vary: record
                .vary_headers
                .iter()
                .map(|(name, _)| name.clone())
                .collect(),
        };
        let variant = variant_key(&key, &record.vary_headers);
        // record first, so a reader finding the variant names finds the record
        self.write_entry(&variant, &StoredEntry::Record(record)).await?;
        self.write_entry(&key, &variants).await
    }
}

fn check_method(request: &CacheRequest) -> CacheResult<()> {
    if request.method == Method::GET {
        Ok(())
    } else {
        Err(CacheError::UnsupportedMethod(request.method.to_string()))
    }
}

impl<S> fmt::Debug for StorageCacheManager<S>
where
    S: Storage,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCacheManager")
            .field("storage", &self.storage.name())
            .field("namespace", &self.namespace)
            .field("uncacheable_request_headers", &self.uncacheable_request_headers)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait]
impl<S> CacheManager for StorageCacheManager<S>
where
    S: Storage,
{
    async fn match_request(
        &self,
        request: &CacheRequest,
        options: MatchOptions,
    ) -> CacheResult<Option<StoredResponse>> {
        let found = self
            .records(Some(request), options)
            .await?
            .into_iter()
            .next()
            .map(|record| record.response);
        trace!(url = %request.url, hit = found.is_some(), "cache match");
        Ok(found)
    }

    async fn put(&self, request: &CacheRequest, response: StoredResponse) -> CacheResult<()> {
        check_method(request)?;
        if self.is_uncacheable(request) {
            debug!(url = %request.url, "request carries an uncacheable header, not stored");
            return Ok(());
        }
        self.store(request, response).await?;
        trace!(url = %request.url, "cache put");
        Ok(())
    }

    async fn delete(&self, request: &CacheRequest, options: MatchOptions) -> CacheResult<bool> {
        let mut removed = 0;
        for (key, entry) in self.lookup(request, options).await? {
            let status = self.storage.remove(&key).await?;
            if matches!(entry, StoredEntry::Record(_)) && status == DeleteStatus::Deleted {
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(url = %request.url, removed, "cache delete");
        }
        Ok(removed > 0)
    }

    fn bulk(&self) -> Option<&dyn BulkCacheOperations> {
        Some(self)
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "namespace": self.namespace,
            "uncacheableRequestHeaders": self
                .uncacheable_request_headers
                .iter()
                .map(HeaderName::as_str)
                .collect::<Vec<_>>(),
            "ttl": self.ttl.map(|ttl| ttl.as_millis() as u64),
            "storage": self.storage.describe(),
        })
    }
}

#[async_trait]
impl<S> BulkCacheOperations for StorageCacheManager<S>
where
    S: Storage,
{
    async fn match_all(
        &self,
        request: Option<&CacheRequest>,
        options: MatchOptions,
    ) -> CacheResult<Vec<StoredResponse>> {
        let records = self.records(request, options).await?;
        Ok(records.into_iter().map(|record| record.response).collect())
    }

    async fn add(&self, request: &CacheRequest, response: StoredResponse) -> CacheResult<()> {
        check_method(request)?;
        if !response.is_ok() {
            return Err(CacheError::Rejected(response.status));
        }
        self.put(request, response).await
    }

    async fn add_all(&self, entries: Vec<(CacheRequest, StoredResponse)>) -> CacheResult<()> {
        for (request, response) in &entries {
            check_method(request)?;
            if !response.is_ok() {
                return Err(CacheError::Rejected(response.status));
            }
        }
        for (request, response) in entries {
            self.put(&request, response).await?;
        }
        Ok(())
    }

    async fn keys(
        &self,
        request: Option<&CacheRequest>,
        options: MatchOptions,
    ) -> CacheResult<Vec<CacheRequest>> {
        let records = self.records(request, options).await?;
        Ok(records.iter().map(CacheRecord::request).collect())
    }
}
