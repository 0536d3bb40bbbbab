//! The fetch dispatcher: one HTTP call from client configuration and call
//! options.
//!
//! ```no_run
//! use restbox::{BaseClient, CallOptions, ClientOverrides, get};
//!
//! # async fn run() -> Result<(), restbox::Error> {
//! let client = BaseClient::new(
//!     ClientOverrides::new().base_uri("https://api.example.com/{version}"),
//! )?;
//! let product = get(
//!     &client,
//!     CallOptions::new("/products/{id}").path_parameter("id", "42"),
//! )
//! .await?
//! .into_body();
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use http::{Method, StatusCode};
use reqwest_middleware::ClientBuilder;
use restbox_core::{PathParameters, QueryParameters, QueryValue, Resource};
use restbox_reqwest::{HttpCacheMiddleware, RetryMiddleware, RetrySettings};
use serde_json::Value;

use crate::config::{BaseClient, FetchOptions};
use crate::error::{Error, ResponseError};
use crate::headers::{Headers, effective_headers, media_type, to_header_map};
use crate::logging::{FetchLog, log_fetch, log_response};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Request body before it is encoded for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A value encoded according to the `content-type` header.
    Json(Value),
    /// Bytes sent unchanged.
    Raw(Bytes),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Raw(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Raw(Bytes::from(bytes))
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Json(Value::String(text.to_owned()))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Json(Value::String(text))
    }
}

/// Per-call settings.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Path template appended to the base URI.
    pub path: String,
    pub path_parameters: PathParameters,
    pub query_parameters: QueryParameters,
    /// Replace client headers of the same name, whatever their casing.
    pub headers: Headers,
    pub retry_settings: RetrySettings,
    pub fetch_options: FetchOptions,
    pub body: Option<RequestBody>,
    /// Return the response instead of its parsed body.
    pub raw_response: bool,
    /// Send the body without encoding it for its content type.
    pub disable_transform_body: bool,
}

impl CallOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn path_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name.into(), value.into());
        self
    }

    pub fn query_parameters(mut self, parameters: QueryParameters) -> Self {
        self.query_parameters = parameters;
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query_parameters.insert(name, value);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn retry_settings(mut self, retry_settings: RetrySettings) -> Self {
        self.retry_settings = retry_settings;
        self
    }

    pub fn fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = fetch_options;
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn raw_response(mut self, raw_response: bool) -> Self {
        self.raw_response = raw_response;
        self
    }

    pub fn disable_transform_body(mut self, disable: bool) -> Self {
        self.disable_transform_body = disable;
        self
    }
}

/// Outcome of a successful call.
#[derive(Debug)]
pub enum FetchResult {
    /// The response, when [`CallOptions::raw_response`] was set.
    Raw(reqwest::Response),
    /// The parsed JSON body, `{}` for an empty body.
    Body(Value),
}

impl FetchResult {
    /// The parsed body, `None` for raw results.
    pub fn into_body(self) -> Option<Value> {
        match self {
            FetchResult::Body(body) => Some(body),
            FetchResult::Raw(_) => None,
        }
    }

    /// The response, `None` for parsed results.
    pub fn into_response(self) -> Option<reqwest::Response> {
        match self {
            FetchResult::Raw(response) => Some(response),
            FetchResult::Body(_) => None,
        }
    }
}

fn is_successful(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

/// Parses the JSON body of a 2xx or 304 response; an empty body gives `{}`.
///
/// Any other status fails with [`Error::Response`].
pub async fn get_object_from_response(response: reqwest::Response) -> Result<Value, Error> {
    if !is_successful(response.status()) {
        return Err(ResponseError::new(response).into());
    }
    let text = response.text().await?;
    if text.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Encodes `body` for the wire.
///
/// JSON bodies follow the media type: JSON text for `application/json` or no
/// content type, form encoding for `application/x-www-form-urlencoded` and
/// pass-through for anything else or when `disable_transform` is set.
fn encode_body(
    body: RequestBody,
    media_type: Option<&str>,
    disable_transform: bool,
) -> Result<Bytes, Error> {
    let value = match body {
        RequestBody::Raw(bytes) => return Ok(bytes),
        RequestBody::Json(value) => value,
    };
    if disable_transform {
        return Ok(pass_through(value)?);
    }
    match media_type {
        None | Some(JSON) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        Some(FORM) => Ok(Bytes::from(serde_urlencoded::to_string(&value)?)),
        Some(_) => Ok(pass_through(value)?),
    }
}

fn pass_through(value: Value) -> Result<Bytes, serde_json::Error> {
    match value {
        Value::String(text) => Ok(Bytes::from(text)),
        other => serde_json::to_vec(&other).map(Bytes::from),
    }
}

/// Sends one request built from `client` and `options`.
///
/// The URL is rendered before anything is sent, so a missing template
/// parameter fails without network activity. The cache manager of the client,
/// when there is one, is consulted by the fetch layer; its failures are
/// returned as [`Error::Cache`].
pub async fn run_fetch(
    method: Method,
    client: &BaseClient,
    options: CallOptions,
) -> Result<FetchResult, Error> {
    let config = &client.config;
    let base_uri_parameters = config
        .parameters
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let url = Resource::from_parts(
        config.base_uri.as_str(),
        base_uri_parameters,
        options.path,
        options.path_parameters,
        options.query_parameters,
    )
    .render()?;

    let headers = effective_headers(&config.headers, &options.headers);
    let fetch_options = config.fetch_options.merge(&options.fetch_options);
    let retry_settings = config.retry_settings.merge(&options.retry_settings);
    let body = options
        .body
        .map(|body| {
            encode_body(
                body,
                media_type(&headers).as_deref(),
                options.disable_transform_body,
            )
        })
        .transpose()?;

    log_fetch(&FetchLog {
        method: &method,
        url: &url,
        headers: &headers,
        fetch_options: &fetch_options,
        retry_settings: &retry_settings,
        cache_manager: config.cache_manager.as_ref(),
        body: body.as_deref(),
    });

    let mut builder = ClientBuilder::new(client.transport(&fetch_options)?);
    if let Some(manager) = &config.cache_manager {
        builder = builder.with(HttpCacheMiddleware::new(manager.clone()));
    }
    let http = builder.with(RetryMiddleware::default()).build();

    let mut request = http
        .request(method, &url)
        .headers(to_header_map(&headers)?)
        .with_extension(retry_settings)
        .with_extension(fetch_options.cache.unwrap_or_default());
    if let Some(timeout) = fetch_options.timeout {
        request = request.timeout(timeout);
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = request.send().await?;
    log_response(&response);

    if !options.raw_response {
        return get_object_from_response(response).await.map(FetchResult::Body);
    }
    if is_successful(response.status()) {
        Ok(FetchResult::Raw(response))
    } else {
        Err(ResponseError::new(response).into())
    }
}

/// `GET` shorthand for [`run_fetch`].
pub async fn get(client: &BaseClient, options: CallOptions) -> Result<FetchResult, Error> {
    run_fetch(Method::GET, client, options).await
}

/// `DELETE` shorthand for [`run_fetch`].
pub async fn delete(client: &BaseClient, options: CallOptions) -> Result<FetchResult, Error> {
    run_fetch(Method::DELETE, client, options).await
}

/// `PATCH` shorthand for [`run_fetch`].
pub async fn patch(client: &BaseClient, options: CallOptions) -> Result<FetchResult, Error> {
    run_fetch(Method::PATCH, client, options).await
}

/// `POST` shorthand for [`run_fetch`].
pub async fn post(client: &BaseClient, options: CallOptions) -> Result<FetchResult, Error> {
    run_fetch(Method::POST, client, options).await
}

/// `PUT` shorthand for [`run_fetch`].
pub async fn put(client: &BaseClient, options: CallOptions) -> Result<FetchResult, Error> {
    run_fetch(Method::PUT, client, options).await
}
