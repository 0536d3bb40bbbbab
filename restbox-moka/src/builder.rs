//! Builder for configuring [`MokaStorage`].

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;
use restbox_backend::Format;

use crate::storage::{MokaStorage, StoredBytes};

/// Fixed per-entry overhead added by the byte weigher.
const ENTRY_OVERHEAD: usize = 64;

/// Expiration policy reading the TTL stored next to each value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<String, StoredBytes> for Expiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredBytes,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredBytes,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // the new value's TTL wins, Moka keeps the old one otherwise
        value.ttl
    }
}

/// Marker type: capacity has not been configured yet.
///
/// Call either [`max_entries()`](MokaStorageBuilder::max_entries) or
/// [`max_bytes()`](MokaStorageBuilder::max_bytes) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: the cache holds at most `n` entries.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: the cache holds at most `n` bytes (approximate).
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaStorage`].
///
/// `build()` is only available once a capacity is set, and entry and byte
/// limits are mutually exclusive.
///
/// ```
/// use restbox_moka::MokaStorage;
///
/// let storage = MokaStorage::builder()
///     .max_entries(10_000)
///     .build();
/// ```
///
/// Both capacity kinds default to [`EvictionPolicy::lru()`]: entries are
/// evicted strictly by recency and every new entry is admitted.
pub struct MokaStorageBuilder<Cap> {
    capacity: Cap,
    format: Format,
    label: String,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaStorageBuilder<NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            format: Format::Json,
            label: "moka".to_owned(),
            eviction_policy: None,
        }
    }

    /// Sets the maximum number of entries the cache can hold.
    pub fn max_entries(self, capacity: u64) -> MokaStorageBuilder<EntryCapacity> {
        MokaStorageBuilder {
            capacity: EntryCapacity(capacity),
            format: self.format,
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }

    /// Sets the maximum memory budget in bytes.
    ///
    /// The byte count includes the key, the encoded value and a fixed
    /// per-entry overhead.
    pub fn max_bytes(self, bytes: u64) -> MokaStorageBuilder<ByteCapacity> {
        MokaStorageBuilder {
            capacity: ByteCapacity(bytes),
            format: self.format,
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl Default for MokaStorageBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> MokaStorageBuilder<Cap> {
    /// Sets the label reported in logs. Default: `"moka"`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the eviction policy.
    ///
    /// | Policy | Description |
    /// |--------|-------------|
    /// | [`lru()`](EvictionPolicy::lru) | Pure least-recently-used (default) |
    /// | [`tiny_lfu()`](EvictionPolicy::tiny_lfu) | LRU eviction + LFU admission |
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Sets the value serialization format. Default: [`Format::Json`].
    pub fn value_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

impl MokaStorageBuilder<EntryCapacity> {
    /// Builds the [`MokaStorage`] with entry-count based capacity.
    pub fn build(self) -> MokaStorage {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let cache: Cache<String, StoredBytes> = CacheBuilder::new(self.capacity.0)
            .eviction_policy(policy)
            .expire_after(Expiration)
            .build();

        MokaStorage {
            cache,
            format: self.format,
            label: self.label,
        }
    }
}

impl MokaStorageBuilder<ByteCapacity> {
    /// Builds the [`MokaStorage`] with byte-based capacity.
    pub fn build(self) -> MokaStorage {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let cache: Cache<String, StoredBytes> = CacheBuilder::new(self.capacity.0)
            .weigher(Self::byte_weigher)
            .eviction_policy(policy)
            .expire_after(Expiration)
            .build();

        MokaStorage {
            cache,
            format: self.format,
            label: self.label,
        }
    }

    fn byte_weigher(key: &String, value: &StoredBytes) -> u32 {
        (key.len() + value.data.len() + ENTRY_OVERHEAD).min(u32::MAX as usize) as u32
    }
}
