//! Core types shared by every restbox crate.
//!
//! This crate knows nothing about transports or storage engines. It provides:
//!
//! - [`Resource`] - renders a request URL from templated base URI and path,
//!   path parameters and query parameters.
//! - [`CacheManager`] - the capability trait a cache store implements to be
//!   consulted by the fetch layer, with [`BulkCacheOperations`] as an
//!   optional extension.
//! - [`CacheRequest`] and [`StoredResponse`] - the two halves of a cache entry.
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod query;
pub mod request;
pub mod resource;
pub mod response;

pub use cache::{BulkCacheOperations, CacheManager, MatchOptions};
pub use error::{CacheError, CacheResult, ParameterError};
pub use query::{QueryParameters, QueryValue};
pub use request::CacheRequest;
pub use resource::{PathParameters, Resource, substitute_path_parameters};
pub use response::StoredResponse;
