//! Fetch layer for restbox: HTTP caching and retries as
//! [`reqwest_middleware`] middlewares.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reqwest_middleware::ClientBuilder;
//! use restbox_reqwest::{HttpCacheMiddleware, RetryMiddleware, RetrySettings};
//!
//! let manager = Arc::new(restbox_moka::memory_cache_manager(1_000));
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(HttpCacheMiddleware::new(manager))
//!     .with(RetryMiddleware::new(RetrySettings::with_retries(2)))
//!     .build();
//! ```
//!
//! The cache middleware must come first so that retries never bypass it.
//! Per-request [`CacheMode`] and [`RetrySettings`] travel in the request
//! extensions.

mod middleware;
mod mode;
pub mod policy;
mod retry;

pub use middleware::{CACHE_STATUS_HEADER, CacheStatus, HttpCacheMiddleware};
pub use mode::CacheMode;
pub use policy::{CacheControl, CachePolicy};
pub use retry::{RetryMiddleware, RetrySettings, is_retryable_status};
