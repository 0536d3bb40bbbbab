//! Storage trait and the cache manager built on top of it.
//!
//! If you want to plug a new key-value store into restbox, implement
//! [`Storage`] and wrap it into a [`StorageCacheManager`]: it takes care of
//! request matching, `Vary` handling and record serialization, and exposes the
//! result as a [`CacheManager`](restbox_core::CacheManager).
mod error;
pub mod format;
pub mod key;
mod manager;
mod record;
mod storage;

pub use error::BackendError;
pub use format::{Format, FormatError};
pub use key::{DEFAULT_NAMESPACE, storage_key};
pub use manager::StorageCacheManager;
pub use record::CacheRecord;
pub use storage::{BackendResult, Storage};

/// Status of deleting result.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted,
    /// Record already missing.
    Missing,
}
