//! Redis cache store for restbox.
//!
//! [`RedisStorage`] keeps one Redis string per cached URL. Single nodes are
//! reached through a [`ConnectionManager`](redis::aio::ConnectionManager);
//! clusters need the `cluster` feature.
//!
//! ```no_run
//! use restbox_redis::{ConnectionMode, RedisCacheManager};
//!
//! # async fn run() -> Result<(), restbox_redis::error::Error> {
//! let manager = RedisCacheManager::connect(ConnectionMode::single("redis://127.0.0.1/"))?;
//! // ...
//! manager.quit().await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
mod manager;
pub mod storage;

#[doc(inline)]
pub use crate::manager::RedisCacheManager;
#[doc(inline)]
pub use crate::storage::{ConnectionMode, RedisStorage, RedisStorageBuilder, SingleConfig};

#[cfg(feature = "cluster")]
#[doc(inline)]
pub use crate::storage::ClusterConfig;

/// Replaces the live connection in log descriptions.
pub const REDACTED_CONNECTION: &str = "<Removed from log by restbox, as it is not serializable>";

/// Replaces cluster topologies in log descriptions.
pub const REDACTED_CLUSTER: &str = "<Redis Cluster>";
