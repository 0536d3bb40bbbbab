//! Retry settings and middleware.

use std::time::Duration;

use async_trait::async_trait;
use http::Extensions;
use rand::Rng;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Error, Middleware, Next, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_FACTOR: f64 = 2.0;
const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Retry policy for transport failures and retryable statuses.
///
/// Every field is optional so that settings can be layered: unset fields
/// fall back to the layer below (see [`RetrySettings::merge`]) and finally to
/// the defaults: no retries, factor `2`, 1 second minimum delay, no maximum,
/// no randomization.
///
/// ```yaml
/// retries: 3
/// factor: 2
/// min_timeout: 100ms
/// max_timeout: 5s
/// randomize: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Number of retries after the first attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Exponential backoff factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    /// Delay before the first retry.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub min_timeout: Option<Duration>,
    /// Upper bound for any delay.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<Duration>,
    /// Multiply delays by a random factor in `[1, 2)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomize: Option<bool>,
}

impl RetrySettings {
    /// Settings with `retries` set and everything else unset.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            retries: Some(retries),
            ..Self::default()
        }
    }

    /// Overlays `overrides` on `self`: set fields of `overrides` win.
    pub fn merge(&self, overrides: &RetrySettings) -> RetrySettings {
        RetrySettings {
            retries: overrides.retries.or(self.retries),
            factor: overrides.factor.or(self.factor),
            min_timeout: overrides.min_timeout.or(self.min_timeout),
            max_timeout: overrides.max_timeout.or(self.max_timeout),
            randomize: overrides.randomize.or(self.randomize),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.retries.unwrap_or(0)
    }

    /// Delay before retry number `attempt` (0-indexed), without randomization.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.factor.unwrap_or(DEFAULT_FACTOR);
        let min = self.min_timeout.unwrap_or(DEFAULT_MIN_TIMEOUT);
        let millis = min.as_millis() as f64 * factor.powi(attempt as i32);
        let delay = Duration::from_millis(millis.min(u64::MAX as f64) as u64);
        match self.max_timeout {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Delay before retry number `attempt`, randomized when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.randomize.unwrap_or(false) {
            delay.mul_f64(rand::rng().random_range(1.0..2.0))
        } else {
            delay
        }
    }
}

/// Returns `true` for statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 420 | 429) || status.is_server_error()
}

fn should_retry(result: &Result<Response>) -> bool {
    match result {
        Ok(response) => is_retryable_status(response.status()),
        Err(Error::Reqwest(error)) => !error.is_builder() && !error.is_redirect(),
        // cache store failures are not transient
        Err(_) => false,
    }
}

/// Middleware retrying failed requests according to [`RetrySettings`].
///
/// Settings found in the request extensions are layered over the defaults
/// given at construction. Requests whose body cannot be cloned (streams) are
/// sent once.
#[derive(Debug, Clone, Default)]
pub struct RetryMiddleware {
    defaults: RetrySettings,
}

impl RetryMiddleware {
    pub fn new(defaults: RetrySettings) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let settings = match extensions.get::<RetrySettings>() {
            Some(overrides) => self.defaults.merge(overrides),
            None => self.defaults.clone(),
        };
        let retries = settings.max_retries();

        let mut request = req;
        let mut attempt = 0;
        loop {
            let duplicate = if attempt < retries {
                request.try_clone()
            } else {
                None
            };
            let url = request.url().clone();
            let result = next.clone().run(request, extensions).await;

            let Some(duplicate) = duplicate else {
                return result;
            };
            if !should_retry(&result) {
                return result;
            }

            let delay = settings.delay_for_attempt(attempt);
            match &result {
                Ok(response) => warn!(
                    url = %url,
                    status = response.status().as_u16(),
                    attempt = attempt + 1,
                    ?delay,
                    "retrying request"
                ),
                Err(error) => warn!(
                    url = %url,
                    %error,
                    attempt = attempt + 1,
                    ?delay,
                    "retrying request"
                ),
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
            request = duplicate;
        }
    }
}
