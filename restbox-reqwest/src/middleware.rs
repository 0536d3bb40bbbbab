//! HTTP cache middleware for reqwest-middleware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::header::{AGE, HeaderValue};
use http::{Extensions, Method, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware::{Error, Middleware, Next, Result};
use restbox_core::{CacheError, CacheManager, CacheRequest, MatchOptions, StoredResponse};
use tracing::debug;

use crate::mode::CacheMode;
use crate::policy::{CachePolicy, revalidated};

/// Header telling how the response was produced.
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";

/// Value of [`CACHE_STATUS_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache without contacting the origin.
    Hit,
    /// Fetched from the origin.
    Miss,
    /// Confirmed by the origin with `304 Not Modified`, body from the cache.
    Revalidated,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Revalidated => "REVALIDATED",
        }
    }
}

/// HTTP cache middleware backed by a [`CacheManager`].
///
/// `GET` requests are answered from the cache while fresh and revalidated
/// with their stored validators once stale. `HEAD` requests bypass the
/// cache. Successful unsafe requests evict every stored entry of their URL.
/// The [`CacheMode`] found in the request extensions adjusts this per request.
///
/// Cache store failures fail the request: they surface as
/// [`reqwest_middleware::Error::Middleware`] wrapping a [`CacheError`].
#[derive(Clone, Debug)]
pub struct HttpCacheMiddleware {
    manager: Arc<dyn CacheManager>,
}

impl HttpCacheMiddleware {
    pub fn new(manager: Arc<dyn CacheManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<dyn CacheManager> {
        &self.manager
    }

    /// Buffers `response`, stores it when cacheable and hands it back.
    async fn store(
        &self,
        request: &CacheRequest,
        response: Response,
        mode: CacheMode,
    ) -> Result<Response> {
        let stored = into_stored(response).await?;
        if mode.writes() && CachePolicy::new(&stored).is_storable(request) {
            self.manager
                .put(request, stored.clone())
                .await
                .map_err(cache_error)?;
            debug!(url = %request.url, status = stored.status, "response stored");
        }
        into_response(stored, CacheStatus::Miss, None)
    }
}

fn cache_error(error: CacheError) -> Error {
    Error::Middleware(anyhow::Error::new(error))
}

fn cache_request(request: &Request) -> CacheRequest {
    CacheRequest {
        method: request.method().clone(),
        url: request.url().to_string(),
        headers: request.headers().clone(),
    }
}

async fn into_stored(response: Response) -> Result<StoredResponse> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok(StoredResponse::new(status, url, body).with_header_map(&headers))
}

fn into_response(
    stored: StoredResponse,
    status: CacheStatus,
    age: Option<Duration>,
) -> Result<Response> {
    let code = StatusCode::from_u16(stored.status)
        .map_err(|error| Error::Middleware(anyhow::Error::new(error)))?;
    let mut headers = stored.header_map();
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status.as_str()));
    if let Some(age) = age {
        headers.insert(AGE, HeaderValue::from(age.as_secs()));
    }

    let mut response = http::Response::new(reqwest::Body::from(stored.body));
    *response.status_mut() = code;
    *response.headers_mut() = headers;
    Ok(Response::from(response))
}

fn gateway_timeout() -> Response {
    let mut response = http::Response::new(reqwest::Body::from(Vec::new()));
    *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(CacheStatus::Miss.as_str()),
    );
    Response::from(response)
}

#[async_trait]
impl Middleware for HttpCacheMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let mode = extensions.get::<CacheMode>().copied().unwrap_or_default();
        let request = cache_request(&req);

        if request.method == Method::HEAD {
            return next.run(req, extensions).await;
        }
        if request.method != Method::GET {
            let response = next.run(req, extensions).await?;
            let status = response.status();
            if status.is_success() || status.is_redirection() {
                let options = MatchOptions::new().ignore_method(true).ignore_vary(true);
                let removed = self
                    .manager
                    .delete(&request, options)
                    .await
                    .map_err(cache_error)?;
                if removed {
                    debug!(url = %request.url, method = %request.method, "cache entries invalidated");
                }
            }
            return Ok(response);
        }

        if mode == CacheMode::NoStore {
            return next.run(req, extensions).await;
        }

        let stored = if mode.reads() {
            self.manager
                .match_request(&request, MatchOptions::new())
                .await
                .map_err(cache_error)?
        } else {
            None
        };

        let Some(stored) = stored else {
            if mode == CacheMode::OnlyIfCached {
                debug!(url = %request.url, "only-if-cached miss");
                return Ok(gateway_timeout());
            }
            let response = next.run(req, extensions).await?;
            return self.store(&request, response, mode).await;
        };

        let now = Utc::now();
        let policy = CachePolicy::new(&stored);
        let serve_stored = match mode {
            CacheMode::ForceCache | CacheMode::OnlyIfCached => true,
            CacheMode::NoCache => false,
            _ => policy.is_fresh_for(&request, now),
        };
        if serve_stored {
            debug!(url = %request.url, "cache hit");
            return into_response(stored, CacheStatus::Hit, Some(policy.age(now)));
        }

        if !policy.has_validators() {
            let response = next.run(req, extensions).await?;
            return self.store(&request, response, mode).await;
        }

        let mut conditional = req;
        policy.apply_revalidation_headers(conditional.headers_mut());
        let response = next.run(conditional, extensions).await?;
        if response.status() != StatusCode::NOT_MODIFIED {
            return self.store(&request, response, mode).await;
        }

        debug!(url = %request.url, "cache entry revalidated");
        let refreshed = revalidated(stored, response.headers());
        self.manager
            .put(&request, refreshed.clone())
            .await
            .map_err(cache_error)?;
        into_response(refreshed, CacheStatus::Revalidated, None)
    }
}
