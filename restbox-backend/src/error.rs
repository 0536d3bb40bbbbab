//! Error types for storage operations.

use restbox_core::CacheError;
use thiserror::Error;

use crate::format::FormatError;

/// Error type for storage operations.
///
/// This enum categorizes errors that can occur during storage interactions
/// into distinct groups for appropriate handling.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal storage error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote stores (e.g., Redis).
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// Serialization or deserialization error.
    #[error(transparent)]
    FormatError(#[from] FormatError),
}

impl From<BackendError> for CacheError {
    fn from(error: BackendError) -> Self {
        CacheError::store(error)
    }
}
