use serde::{Deserialize, Serialize};

/// How a single request uses the HTTP cache.
///
/// Travels to [`HttpCacheMiddleware`](crate::HttpCacheMiddleware) in the
/// request extensions; requests without one use [`CacheMode::Default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Serve fresh entries, revalidate stale ones, store cacheable responses.
    #[default]
    Default,
    /// Neither read nor write the cache.
    NoStore,
    /// Skip the lookup but store the response.
    Reload,
    /// Always revalidate a stored entry before using it.
    NoCache,
    /// Use any stored entry regardless of its age.
    ForceCache,
    /// Use any stored entry; answer `504 Gateway Timeout` on a miss.
    OnlyIfCached,
}

impl CacheMode {
    /// Returns `true` when a stored entry should be looked up.
    pub fn reads(&self) -> bool {
        !matches!(self, CacheMode::NoStore | CacheMode::Reload)
    }

    /// Returns `true` when a cacheable response should be stored.
    pub fn writes(&self) -> bool {
        !matches!(self, CacheMode::NoStore)
    }
}
