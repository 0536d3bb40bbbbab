//! Error types for Redis store operations.
//!
//! All errors convert to [`BackendError`] so they travel through the cache
//! layer like any other store failure.
//!
//! [`BackendError`]: restbox_backend::BackendError

use redis::RedisError;
use restbox_backend::BackendError;

/// Error type for Redis store operations.
///
/// # When You'll Encounter This
///
/// - Building a [`RedisStorage`](crate::RedisStorage) with an invalid
///   connection URL
/// - The first cache operation when Redis is unreachable (connections are
///   established lazily)
/// - Any command the server answers with an error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),

    /// Connection mode was not specified when building the storage.
    ///
    /// Call [`RedisStorageBuilder::connection`](crate::RedisStorageBuilder::connection)
    /// before [`RedisStorageBuilder::build`](crate::RedisStorageBuilder::build).
    #[error("Connection mode not specified. Call .connection() before .build()")]
    MissingConnectionMode,
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        match error {
            Error::Redis(_) => Self::ConnectionError(Box::new(error)),
            Error::MissingConnectionMode => Self::InternalError(Box::new(error)),
        }
    }
}
