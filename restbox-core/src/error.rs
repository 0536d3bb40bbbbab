//! Error types for URL rendering and cache store interaction.

use thiserror::Error;

/// Error raised while rendering a [`Resource`](crate::Resource).
///
/// Rendering never produces a partial URL: the first placeholder without a
/// value aborts the whole render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A `{name}` placeholder in the base URI or path has no value.
    #[error("Failed to find a value for required path parameter '{0}'")]
    MissingPathParameter(String),
}

/// Error raised by a [`CacheManager`](crate::CacheManager) implementation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed (connection loss, serialization, ...).
    #[error(transparent)]
    Store(Box<dyn std::error::Error + Send + Sync>),

    /// The entry was refused because its response is not successful.
    ///
    /// Only raised by [`BulkCacheOperations::add`](crate::BulkCacheOperations::add)
    /// and [`BulkCacheOperations::add_all`](crate::BulkCacheOperations::add_all).
    #[error("Response with status {0} can't be added to the cache")]
    Rejected(u16),

    /// Only `GET` requests can be stored.
    #[error("Request method '{0}' is unsupported")]
    UnsupportedMethod(String),
}

impl CacheError {
    /// Wraps any store error.
    pub fn store<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Store(Box::new(error))
    }
}

/// Result alias for cache manager operations.
pub type CacheResult<T> = Result<T, CacheError>;
