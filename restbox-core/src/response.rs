//! The response half of a cache entry.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// A response as kept by a cache store.
///
/// Headers are stored as ordered name/value pairs so that binary storage
/// formats can round-trip them as well as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase sent along with the status.
    pub status_text: String,
    /// URL the response was received from.
    pub url: String,
    /// Response headers in arrival order, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
    /// When the response was received from the origin.
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Creates a response stamped with the current time and the canonical
    /// reason phrase for `status`.
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_owned();
        Self {
            status,
            status_text,
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Copies headers from an [`HeaderMap`], skipping values that are not text.
    pub fn with_header_map(mut self, headers: &HeaderMap) -> Self {
        self.headers.extend(headers.iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        }));
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterates every value of a header, case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replaces every value of a header with a single new value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }

    /// Header names listed by `Vary`, lowercased. `*` is returned as is.
    pub fn vary(&self) -> Vec<String> {
        self.header_values("vary")
            .flat_map(|value| value.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Builds an [`HeaderMap`], skipping pairs that are not valid HTTP headers.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}
