//! Bounded in-memory cache store powered by [Moka](https://docs.rs/moka).
//!
//! The store keeps at most a fixed number of entries (10 000 by default) and
//! evicts the least recently used one when full. Reads count as use.
//!
//! ```
//! use restbox_moka::memory_cache_manager;
//!
//! let manager = memory_cache_manager(500);
//! ```
#![warn(missing_docs)]

mod builder;
mod storage;

pub use builder::{ByteCapacity, EntryCapacity, MokaStorageBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
pub use storage::{MokaStorage, StoredBytes};

use restbox_backend::StorageCacheManager;

/// Maximum number of entries of the default in-memory store.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Cache manager over a [`MokaStorage`].
pub type MokaCacheManager = StorageCacheManager<MokaStorage>;

/// Creates an LRU cache manager holding at most `max_entries` entries.
pub fn memory_cache_manager(max_entries: u64) -> MokaCacheManager {
    StorageCacheManager::new(MokaStorage::builder().max_entries(max_entries).build())
}
