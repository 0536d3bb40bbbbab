//! Errors surfaced to callers of the fetch functions.

use restbox_core::{CacheError, ParameterError};
use thiserror::Error;

/// A response with a status other than 2xx or `304 Not Modified`.
///
/// Carries the whole response so callers can still read its body.
#[derive(Debug, Error)]
#[error("{status} {status_text}")]
pub struct ResponseError {
    /// Numeric status code.
    pub status: u16,
    /// Canonical reason phrase, empty for unknown codes.
    pub status_text: String,
    /// The response as received.
    pub response: reqwest::Response,
}

impl ResponseError {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let status = response.status();
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            response,
        }
    }
}

/// Errors raised while building a client from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document does not describe a client.
    #[error(transparent)]
    Yaml(#[from] serde_saphyr::Error),

    /// The configured cache store was not compiled in.
    #[error("Cache store not available: {0}")]
    BackendNotAvailable(String),

    /// The cache store rejected its settings.
    #[error("Invalid cache store settings: {0}")]
    InvalidBackend(String),

    /// The transport could not be built from the fetch options.
    #[error("Failed to build HTTP client: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Error returned by the fetch functions.
#[derive(Debug, Error)]
pub enum Error {
    /// A URL template placeholder has no value. Raised before any request is sent.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The server answered with an unsuccessful status.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Connection, DNS, timeout or middleware failure.
    #[error(transparent)]
    Transport(reqwest_middleware::Error),

    /// The cache manager failed while serving the request.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A header name or value is not valid HTTP.
    #[error("Invalid header '{name}'")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// Parse failure of the name or the value.
        #[source]
        source: http::Error,
    },

    /// JSON encoding of a request body or decoding of a response body failed.
    #[error(transparent)]
    Body(#[from] serde_json::Error),

    /// Form encoding of a request body failed.
    #[error(transparent)]
    Form(#[from] serde_urlencoded::ser::Error),

    /// Invalid client configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest_middleware::Error> for Error {
    fn from(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<CacheError>() {
                Ok(cache) => Error::Cache(cache),
                Err(inner) => Error::Transport(reqwest_middleware::Error::Middleware(inner)),
            },
            other => Error::Transport(other),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(reqwest_middleware::Error::Reqwest(error))
    }
}
