//! Request and response log lines.
//!
//! Every call logs `Request: <METHOD> <url>` and
//! `Response: <successful|unsuccessful> <status> <status text>` at info
//! level under the [`LOG_TARGET`] target. At debug level the effective fetch
//! options are logged as pretty JSON together with an equivalent `curl`
//! command, followed by the response headers.
//!
//! Cache managers appear in the fetch options through
//! [`CacheManager::describe`], which keeps live connections out of the logs.

use std::sync::Arc;

use http::Method;
use restbox_core::CacheManager;
use restbox_reqwest::RetrySettings;
use serde_json::{Map, Value, json};
use tracing::{Level, debug, info};

use crate::config::FetchOptions;
use crate::headers::Headers;

/// Target of every log line emitted by this crate.
pub const LOG_TARGET: &str = "restbox";

/// Everything known about a request right before it is sent.
#[derive(Debug, Clone, Copy)]
pub struct FetchLog<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: &'a Headers,
    pub fetch_options: &'a FetchOptions,
    pub retry_settings: &'a RetrySettings,
    pub cache_manager: Option<&'a Arc<dyn CacheManager>>,
    pub body: Option<&'a [u8]>,
}

impl FetchLog<'_> {
    /// Fetch options as written to the debug log.
    pub fn options_json(&self) -> Value {
        let mut options = match serde_json::to_value(self.fetch_options) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        options.insert(
            "cacheManager".to_owned(),
            self.cache_manager
                .map(|manager| manager.describe())
                .unwrap_or(Value::Null),
        );
        options.insert("method".to_owned(), json!(self.method.as_str()));
        options.insert("headers".to_owned(), json!(self.headers));
        options.insert(
            "retry".to_owned(),
            serde_json::to_value(self.retry_settings).unwrap_or_else(|_| json!({})),
        );
        if let Some(body) = self.body {
            options.insert(
                "body".to_owned(),
                json!(String::from_utf8_lossy(body).into_owned()),
            );
        }
        Value::Object(options)
    }
}

/// Logs an outgoing request.
pub fn log_fetch(fetch: &FetchLog<'_>) {
    info!(target: LOG_TARGET, "Request: {} {}", fetch.method, fetch.url);
    if tracing::enabled!(target: LOG_TARGET, Level::DEBUG) {
        let options = serde_json::to_string_pretty(&fetch.options_json()).unwrap_or_default();
        debug!(
            target: LOG_TARGET,
            "Fetch Options: {}\nCurl: {}",
            options,
            fetch_to_curl(fetch.method, fetch.url, fetch.headers, fetch.body)
        );
    }
}

/// Logs a received response.
pub fn log_response(response: &reqwest::Response) {
    let status = response.status();
    let outcome = if status.is_success() || status == http::StatusCode::NOT_MODIFIED {
        "successful"
    } else {
        "unsuccessful"
    };
    info!(
        target: LOG_TARGET,
        "Response: {} {} {}",
        outcome,
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    if tracing::enabled!(target: LOG_TARGET, Level::DEBUG) {
        let headers = serde_json::to_string_pretty(&headers_json(response.headers()))
            .unwrap_or_default();
        debug!(target: LOG_TARGET, "Response Headers: {}", headers);
    }
}

fn headers_json(headers: &http::HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|value| json!(String::from_utf8_lossy(value.as_bytes())))
            .collect();
        map.insert(name.as_str().to_owned(), Value::Array(values));
    }
    Value::Object(map)
}

/// Command line reproducing a request with `curl`.
pub fn fetch_to_curl(
    method: &Method,
    url: &str,
    headers: &Headers,
    body: Option<&[u8]>,
) -> String {
    let mut command = format!("curl \"{url}\" -X {method}");
    for (name, value) in headers {
        command.push_str(&format!(" -H \"{}: {}\"", name, escape_double(value)));
    }
    if let Some(body) = body {
        let body = String::from_utf8_lossy(body).replace('\'', "'\\''");
        command.push_str(&format!(" --data-binary '{body}'"));
    }
    command
}

fn escape_double(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
