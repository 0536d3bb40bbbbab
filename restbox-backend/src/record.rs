use http::{HeaderMap, HeaderName, HeaderValue, Method};
use restbox_core::{CacheRequest, MatchOptions, StoredResponse, request::strip_search};
use serde::{Deserialize, Serialize};

/// One stored request/response pair.
///
/// Only the request headers named by the response `Vary` header are kept,
/// since nothing else takes part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub method: String,
    pub url: String,
    /// Vary-relevant request headers; `None` when the request did not send one.
    pub vary_headers: Vec<(String, Option<String>)>,
    pub response: StoredResponse,
}

impl CacheRecord {
    pub fn new(request: &CacheRequest, response: StoredResponse) -> Self {
        let names: Vec<String> = response
            .vary()
            .into_iter()
            .filter(|name| name != "*")
            .collect();
        let vary_headers = vary_values(request, &names);
        Self {
            method: request.method.as_str().to_owned(),
            url: request.url.clone(),
            vary_headers,
            response,
        }
    }

    /// Returns `true` when `request` is answered by this record.
    pub fn matches(&self, request: &CacheRequest, options: MatchOptions) -> bool {
        if !options.ignore_method && self.method != request.method.as_str() {
            return false;
        }
        same_url(&self.url, request, options)
            && (options.ignore_vary || self.vary_matches(request))
    }

    fn vary_matches(&self, request: &CacheRequest) -> bool {
        // `Vary: *` never matches
        if self.response.vary().iter().any(|name| name == "*") {
            return false;
        }
        self.vary_headers
            .iter()
            .all(|(name, stored)| request.header(name) == stored.as_deref())
    }

    /// Rebuilds the request this record was stored for.
    pub fn request(&self) -> CacheRequest {
        let method = Method::from_bytes(self.method.as_bytes()).unwrap_or(Method::GET);
        let mut headers = HeaderMap::new();
        for (name, value) in &self.vary_headers {
            let Some(value) = value else { continue };
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        CacheRequest {
            method,
            url: self.url.clone(),
            headers,
        }
    }
}

/// Value written under a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum StoredEntry {
    Record(CacheRecord),
    /// Kept under the request key of a response with `Vary`: names the
    /// request headers selecting the variant key that holds the record.
    Variants { url: String, vary: Vec<String> },
}

/// Values `request` sends for the `names` headers.
pub(crate) fn vary_values(
    request: &CacheRequest,
    names: &[String],
) -> Vec<(String, Option<String>)> {
    names
        .iter()
        .map(|name| (name.clone(), request.header(name).map(str::to_owned)))
        .collect()
}

/// Compares a stored URL with the request URL, honoring `ignore_search`.
pub(crate) fn same_url(url: &str, request: &CacheRequest, options: MatchOptions) -> bool {
    if options.ignore_search {
        strip_search(url) == request.url_without_search()
    } else {
        url == request.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::ACCEPT_LANGUAGE;

    fn record(url: &str, vary: Option<&str>, language: Option<&'static str>) -> CacheRecord {
        let mut request = CacheRequest::get(url);
        if let Some(language) = language {
            request = request.with_header(ACCEPT_LANGUAGE, HeaderValue::from_static(language));
        }
        let mut response = StoredResponse::new(200, url, "{}");
        if let Some(vary) = vary {
            response = response.with_header("vary", vary);
        }
        CacheRecord::new(&request, response)
    }

    #[test]
    fn search_is_compared_unless_ignored() {
        let record = record("https://somewhere/path?a=1", None, None);
        let other = CacheRequest::get("https://somewhere/path?a=2");

        assert!(!record.matches(&other, MatchOptions::new()));
        assert!(record.matches(&other, MatchOptions::new().ignore_search(true)));
    }

    #[test]
    fn only_safe_methods_match_by_default() {
        let record = record("https://somewhere/path", None, None);
        let post = CacheRequest::new(Method::POST, "https://somewhere/path");

        assert!(!record.matches(&post, MatchOptions::new()));
        assert!(record.matches(&post, MatchOptions::new().ignore_method(true)));
    }

    #[test]
    fn head_requests_do_not_match_get_records() {
        let record = record("https://somewhere/path", None, None);
        let head = CacheRequest::new(Method::HEAD, "https://somewhere/path");

        assert!(!record.matches(&head, MatchOptions::new()));
        assert!(record.matches(&head, MatchOptions::new().ignore_method(true)));
    }

    #[test]
    fn vary_headers_take_part_in_matching() {
        let record = record("https://somewhere/path", Some("Accept-Language"), Some("en"));
        let english = CacheRequest::get("https://somewhere/path")
            .with_header(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
        let german = CacheRequest::get("https://somewhere/path")
            .with_header(ACCEPT_LANGUAGE, HeaderValue::from_static("de"));

        assert!(record.matches(&english, MatchOptions::new()));
        assert!(!record.matches(&german, MatchOptions::new()));
        assert!(record.matches(&german, MatchOptions::new().ignore_vary(true)));
        assert_eq!(record.request().header("accept-language"), Some("en"));
    }

    #[test]
    fn vary_star_never_matches() {
        let record = record("https://somewhere/path", Some("*"), None);
        let request = CacheRequest::get("https://somewhere/path");

        assert!(!record.matches(&request, MatchOptions::new()));
        assert!(record.matches(&request, MatchOptions::new().ignore_vary(true)));
    }
}
