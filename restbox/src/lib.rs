//! Foundation for generated REST API clients.
//!
//! A [`BaseClient`] holds the configuration shared by every call of one API
//! client: base URI template, headers, base URI parameters, cache manager,
//! retry settings and fetch options. [`run_fetch`] and its shorthands render
//! the request URL, merge client and call settings and send the request
//! through the [`restbox_reqwest`] middlewares, which consult the cache
//! manager for HTTP caching.
//!
//! ```no_run
//! use restbox::{BaseClient, CallOptions, ClientOverrides, post};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), restbox::Error> {
//! let client = BaseClient::new(
//!     ClientOverrides::new()
//!         .base_uri("https://{shortCode}.api.example.com/customer/{version}")
//!         .parameter("shortCode", "acme")
//!         .header("x-api-key", "secret"),
//! )?;
//!
//! let created = post(
//!     &client,
//!     CallOptions::new("/baskets").body(json!({"currency": "EUR"})),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Client configuration, defaults and their merge.
pub mod config;

/// Error types returned by the fetch functions.
pub mod error;

/// The fetch dispatcher.
pub mod fetch;

/// Header maps and their case-insensitive merge rules.
pub mod headers;

/// Request and response logging.
pub mod logging;

pub use config::{
    BaseClient, CacheManagerConfig, CacheManagerSetting, ClientConfig, ClientDefaults,
    ClientOverrides, ClientSettings, FetchOptions, Parameters, Redirect,
};
pub use error::{ConfigError, Error, ResponseError};
pub use fetch::{
    CallOptions, FetchResult, RequestBody, delete, get, get_object_from_response, patch, post,
    put, run_fetch,
};
pub use headers::{Headers, get_headers, merge_headers};

pub use restbox_core::{
    BulkCacheOperations, CacheError, CacheManager, CacheRequest, MatchOptions, ParameterError,
    QueryParameters, QueryValue, Resource, StoredResponse,
};
pub use restbox_reqwest::{CacheMode, RetrySettings};
