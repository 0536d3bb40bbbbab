//! The request half of a cache entry.

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Request description used to look up and store cache entries.
///
/// Carries only what matching needs: the method, the full URL and the
/// request headers (for `Vary` comparison).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URL including the query string.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
}

impl CacheRequest {
    /// Creates a request without headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the URL without its query string and fragment.
    pub fn url_without_search(&self) -> &str {
        strip_search(&self.url)
    }

    /// Returns the header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

/// Returns `url` without its query string and fragment.
pub fn strip_search(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
