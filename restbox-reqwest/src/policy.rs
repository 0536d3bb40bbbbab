//! HTTP caching rules for a private cache (RFC 7234).
//!
//! [`CachePolicy`] answers three questions about a stored response: may it be
//! stored at all, may it be served without contacting the origin, and which
//! validators to send when it may not.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{Method, header};
use restbox_core::{CacheRequest, StoredResponse};

/// Statuses that may be cached without explicit freshness information.
const HEURISTIC_STATUSES: [u16; 11] = [200, 203, 204, 300, 301, 308, 404, 405, 410, 414, 501];

/// Statuses this cache knows how to store.
const UNDERSTOOD_STATUSES: [u16; 14] = [
    200, 203, 204, 300, 301, 302, 303, 307, 308, 404, 405, 410, 414, 501,
];

/// Heuristic freshness is `(Date - Last-Modified) / HEURISTIC_DIVISOR`.
const HEURISTIC_DIVISOR: u32 = 10;

/// Headers a 304 response must not overwrite on the stored response.
const NOT_UPDATED_ON_REVALIDATION: [&str; 4] = [
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "content-range",
];

/// Parsed `Cache-Control` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub private: bool,
    pub public: bool,
}

impl CacheControl {
    /// Parses every `Cache-Control` value. Unknown directives are ignored.
    pub fn parse<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut directives = Self::default();
        for directive in values.into_iter().flat_map(|value| value.split(',')) {
            let (name, argument) = match directive.split_once('=') {
                Some((name, argument)) => (name, Some(argument.trim().trim_matches('"'))),
                None => (directive, None),
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "max-age" => directives.max_age = argument.and_then(|value| value.parse().ok()),
                "no-cache" => directives.no_cache = true,
                "no-store" => directives.no_store = true,
                "must-revalidate" => directives.must_revalidate = true,
                "private" => directives.private = true,
                "public" => directives.public = true,
                // s-maxage applies to shared caches only
                _ => {}
            }
        }
        directives
    }

    fn from_request(request: &CacheRequest) -> Self {
        let mut directives = Self::parse(
            request
                .headers
                .get_all(header::CACHE_CONTROL)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        if !request.headers.contains_key(header::CACHE_CONTROL)
            && request
                .headers
                .get(header::PRAGMA)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.eq_ignore_ascii_case("no-cache"))
        {
            directives.no_cache = true;
        }
        directives
    }
}

/// Parses an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Caching rules derived from a stored response.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    status: u16,
    directives: CacheControl,
    date: Option<DateTime<Utc>>,
    /// `None` when absent, `Some(None)` when present but not a valid date.
    expires: Option<Option<DateTime<Utc>>>,
    last_modified: Option<String>,
    etag: Option<String>,
    age: u64,
    vary_star: bool,
    stored_at: DateTime<Utc>,
}

impl CachePolicy {
    pub fn new(response: &StoredResponse) -> Self {
        Self {
            status: response.status,
            directives: CacheControl::parse(response.header_values("cache-control")),
            date: response.header("date").and_then(parse_http_date),
            expires: response.header("expires").map(parse_http_date),
            last_modified: response.header("last-modified").map(str::to_owned),
            etag: response.header("etag").map(str::to_owned),
            age: response
                .header("age")
                .and_then(|age| age.trim().parse().ok())
                .unwrap_or(0),
            vary_star: response.vary().iter().any(|name| name == "*"),
            stored_at: response.stored_at,
        }
    }

    fn has_explicit_freshness(&self) -> bool {
        self.directives.max_age.is_some() || self.expires.is_some()
    }

    /// Returns `true` when the response to `request` may be stored.
    pub fn is_storable(&self, request: &CacheRequest) -> bool {
        let request_directives = CacheControl::from_request(request);
        request.method == Method::GET
            && !request_directives.no_store
            && !self.directives.no_store
            && !self.vary_star
            && UNDERSTOOD_STATUSES.contains(&self.status)
            && (HEURISTIC_STATUSES.contains(&self.status)
                || self.has_explicit_freshness()
                || self.directives.public)
    }

    /// How long the response stays fresh after it was generated.
    pub fn freshness_lifetime(&self) -> Duration {
        if self.directives.no_cache {
            return Duration::ZERO;
        }
        if let Some(max_age) = self.directives.max_age {
            return Duration::from_secs(max_age);
        }
        let date = self.date.unwrap_or(self.stored_at);
        if let Some(expires) = self.expires {
            // an invalid Expires means already expired
            return expires
                .and_then(|expires| (expires - date).to_std().ok())
                .unwrap_or(Duration::ZERO);
        }
        if HEURISTIC_STATUSES.contains(&self.status)
            && let Some(last_modified) = self.last_modified.as_deref().and_then(parse_http_date)
            && let Ok(since_modified) = (date - last_modified).to_std()
        {
            return since_modified / HEURISTIC_DIVISOR;
        }
        Duration::ZERO
    }

    /// Current age: the `Age` header plus the time spent in this cache.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let resident = (now - self.stored_at).to_std().unwrap_or(Duration::ZERO);
        Duration::from_secs(self.age) + resident
    }

    /// Returns `true` when the response answers `request` without contacting
    /// the origin.
    pub fn is_fresh_for(&self, request: &CacheRequest, now: DateTime<Utc>) -> bool {
        let request_directives = CacheControl::from_request(request);
        if request_directives.no_cache || self.directives.no_cache {
            return false;
        }
        let age = self.age(now);
        if let Some(max_age) = request_directives.max_age
            && age > Duration::from_secs(max_age)
        {
            return false;
        }
        age < self.freshness_lifetime()
    }

    /// Returns `true` when a conditional request can revalidate the response.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Adds `If-None-Match` / `If-Modified-Since` for the stored validators.
    pub fn apply_revalidation_headers(&self, headers: &mut HeaderMap) {
        if let Some(etag) = self.etag.as_deref().and_then(|etag| HeaderValue::from_str(etag).ok()) {
            headers.insert(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = self
            .last_modified
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
        {
            headers.insert(IF_MODIFIED_SINCE, last_modified);
        }
    }
}

/// Merges the headers of a `304 Not Modified` into the stored response and
/// restarts its age.
pub fn revalidated(mut stored: StoredResponse, not_modified: &HeaderMap) -> StoredResponse {
    for name in not_modified.keys() {
        if NOT_UPDATED_ON_REVALIDATION.contains(&name.as_str()) {
            continue;
        }
        stored
            .headers
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name.as_str()));
        for value in not_modified.get_all(name) {
            if let Ok(value) = value.to_str() {
                stored.headers.push((name.as_str().to_owned(), value.to_owned()));
            }
        }
    }
    stored.stored_at = Utc::now();
    stored
}
