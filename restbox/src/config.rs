//! Client configuration and its merge with process-wide defaults.
//!
//! A [`BaseClient`] is built from [`ClientOverrides`] laid over
//! [`ClientDefaults`] by [`ClientConfig::merge`]:
//!
//! - scalar fields take the override when set, the default otherwise;
//! - `headers` and `parameters` are merged key by key, overrides winning;
//! - `retry_settings` and `fetch_options` are merged field by field;
//! - the cache manager is inherited unless the override names another one
//!   or disables caching.
//!
//! Overrides can also be read from YAML:
//!
//! ```yaml
//! base_uri: https://{shortCode}.api.example.com/product/{version}
//! headers:
//!   x-api-key: secret
//! parameters:
//!   shortCode: acme
//! cache_manager:
//!   type: Memory
//!   max_entries: 500
//! retry_settings:
//!   retries: 2
//!   min_timeout: 100ms
//! fetch_options:
//!   timeout: 30s
//!   redirect: manual
//! ```

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use restbox_core::CacheManager;
use restbox_reqwest::{CacheMode, RetrySettings};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::headers::Headers;

/// Values substituted into the base URI template.
pub type Parameters = IndexMap<String, String>;

/// Entry limit of the default in-memory cache.
pub const DEFAULT_CACHE_ENTRIES: u64 = 10_000;

/// Redirect limit when `follow` is not configured.
pub const DEFAULT_FOLLOW: usize = 20;

lazy_static! {
    static ref GLOBAL_DEFAULTS: ClientDefaults = ClientDefaults::new();
}

/// What to do with redirect responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Redirect {
    /// Follow up to `follow` redirects.
    #[default]
    Follow,
    /// Return redirect responses to the caller.
    Manual,
    /// Fail on the first redirect.
    Error,
}

/// Options handed to the fetch layer.
///
/// Every field is optional so that call-site options can be laid over
/// client options with [`FetchOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// HTTP cache mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheMode>,
    /// Timeout of each attempt; every retry starts a fresh one.
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    /// Redirect handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
    /// Maximum number of redirects followed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<usize>,
}

impl FetchOptions {
    /// Overlays `overrides` on `self`: set fields of `overrides` win.
    pub fn merge(&self, overrides: &FetchOptions) -> FetchOptions {
        FetchOptions {
            cache: overrides.cache.or(self.cache),
            timeout: overrides.timeout.or(self.timeout),
            redirect: overrides.redirect.or(self.redirect),
            follow: overrides.follow.or(self.follow),
        }
    }

    /// Redirect settings the transport has to be built with.
    pub(crate) fn redirect_settings(&self) -> (Redirect, usize) {
        (
            self.redirect.unwrap_or_default(),
            self.follow.unwrap_or(DEFAULT_FOLLOW),
        )
    }
}

/// Cache manager choice of a client.
#[derive(Debug, Clone, Default)]
pub enum CacheManagerSetting {
    /// Use the manager of the defaults.
    #[default]
    Inherit,
    /// Never consult a cache.
    Disabled,
    /// Use this manager.
    Use(Arc<dyn CacheManager>),
}

/// Cache manager as written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheManagerConfig {
    /// Keep the default manager.
    Default,
    /// Disable caching.
    Disabled,
    /// Private bounded in-memory LRU cache.
    Memory {
        /// Maximum number of cached URLs.
        #[serde(default = "default_cache_entries")]
        max_entries: u64,
        /// Key namespace.
        #[serde(default)]
        namespace: Option<String>,
    },
    /// Single Redis server.
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
        connection_string: String,
        /// Key namespace.
        #[serde(default)]
        namespace: Option<String>,
    },
    /// Redis cluster.
    RedisCluster {
        /// Seed node URLs.
        nodes: Vec<String>,
        /// Key namespace.
        #[serde(default)]
        namespace: Option<String>,
    },
}

fn default_cache_entries() -> u64 {
    DEFAULT_CACHE_ENTRIES
}

impl CacheManagerConfig {
    /// Builds the configured manager. Redis connections open on first use.
    pub fn into_setting(self) -> Result<CacheManagerSetting, ConfigError> {
        match self {
            CacheManagerConfig::Default => Ok(CacheManagerSetting::Inherit),
            CacheManagerConfig::Disabled => Ok(CacheManagerSetting::Disabled),
            #[cfg(feature = "moka")]
            CacheManagerConfig::Memory {
                max_entries,
                namespace,
            } => {
                let mut manager = restbox_moka::memory_cache_manager(max_entries);
                if let Some(namespace) = namespace {
                    manager = manager.namespace(namespace);
                }
                Ok(CacheManagerSetting::Use(Arc::new(manager)))
            }
            #[cfg(not(feature = "moka"))]
            CacheManagerConfig::Memory { .. } => {
                Err(ConfigError::BackendNotAvailable("Memory".to_string()))
            }
            #[cfg(feature = "redis")]
            CacheManagerConfig::Redis {
                connection_string,
                namespace,
            } => redis_manager(
                restbox_redis::ConnectionMode::single(connection_string),
                namespace,
            ),
            #[cfg(not(feature = "redis"))]
            CacheManagerConfig::Redis { .. } => {
                Err(ConfigError::BackendNotAvailable("Redis".to_string()))
            }
            #[cfg(feature = "redis-cluster")]
            CacheManagerConfig::RedisCluster { nodes, namespace } => {
                redis_manager(restbox_redis::ConnectionMode::cluster(nodes), namespace)
            }
            #[cfg(not(feature = "redis-cluster"))]
            CacheManagerConfig::RedisCluster { .. } => {
                Err(ConfigError::BackendNotAvailable("RedisCluster".to_string()))
            }
        }
    }
}

#[cfg(feature = "redis")]
fn redis_manager(
    mode: restbox_redis::ConnectionMode,
    namespace: Option<String>,
) -> Result<CacheManagerSetting, ConfigError> {
    let storage = restbox_redis::RedisStorage::builder()
        .connection(mode)
        .build()
        .map_err(|e| ConfigError::InvalidBackend(format!("Redis: {e}")))?;
    let mut manager = restbox_backend::StorageCacheManager::new(storage);
    if let Some(namespace) = namespace {
        manager = manager.namespace(namespace);
    }
    Ok(CacheManagerSetting::Use(Arc::new(
        restbox_redis::RedisCacheManager::new(manager),
    )))
}

/// Settings every client starts from.
#[derive(Debug, Clone)]
pub struct ClientDefaults {
    pub headers: Headers,
    pub parameters: Parameters,
    pub cache_manager: Option<Arc<dyn CacheManager>>,
    pub retry_settings: RetrySettings,
    pub fetch_options: FetchOptions,
}

impl ClientDefaults {
    /// Fresh defaults with their own cache.
    ///
    /// Headers `content-type: application/json` and `connection: close`,
    /// parameter `version: v1` and, with the `moka` feature, an in-memory
    /// cache of [`DEFAULT_CACHE_ENTRIES`] entries.
    pub fn new() -> Self {
        Self {
            headers: Headers::from([
                ("content-type".to_owned(), "application/json".to_owned()),
                ("connection".to_owned(), "close".to_owned()),
            ]),
            parameters: Parameters::from([("version".to_owned(), "v1".to_owned())]),
            cache_manager: default_cache_manager(),
            retry_settings: RetrySettings::default(),
            fetch_options: FetchOptions::default(),
        }
    }

    /// Process-wide defaults, created on first use.
    ///
    /// Every client built with [`BaseClient::new`] shares the cache of these
    /// defaults unless it configures its own.
    pub fn global() -> &'static ClientDefaults {
        &GLOBAL_DEFAULTS
    }
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "moka")]
fn default_cache_manager() -> Option<Arc<dyn CacheManager>> {
    Some(Arc::new(restbox_moka::memory_cache_manager(
        DEFAULT_CACHE_ENTRIES,
    )))
}

#[cfg(not(feature = "moka"))]
fn default_cache_manager() -> Option<Arc<dyn CacheManager>> {
    None
}

/// User settings of a client. Unset fields keep the defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub base_uri: Option<String>,
    pub headers: Headers,
    pub parameters: Parameters,
    pub cache_manager: CacheManagerSetting,
    pub retry_settings: RetrySettings,
    pub fetch_options: FetchOptions,
}

impl ClientOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: ClientSettings = serde_saphyr::from_str(yaml)?;
        settings.try_into()
    }

    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn cache_manager(mut self, manager: Arc<dyn CacheManager>) -> Self {
        self.cache_manager = CacheManagerSetting::Use(manager);
        self
    }

    pub fn disable_cache(mut self) -> Self {
        self.cache_manager = CacheManagerSetting::Disabled;
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
}

/// Serialized form of [`ClientOverrides`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_uri: Option<String>,
    pub headers: Headers,
    pub parameters: Parameters,
    pub cache_manager: Option<CacheManagerConfig>,
    pub retry_settings: RetrySettings,
    pub fetch_options: FetchOptions,
}

impl TryFrom<ClientSettings> for ClientOverrides {
    type Error = ConfigError;

    fn try_from(settings: ClientSettings) -> Result<Self, Self::Error> {
        let cache_manager = match settings.cache_manager {
            Some(config) => config.into_setting()?,
            None => CacheManagerSetting::Inherit,
        };
        Ok(ClientOverrides {
            base_uri: settings.base_uri,
            headers: settings.headers,
            parameters: settings.parameters,
            cache_manager,
            retry_settings: settings.retry_settings,
            fetch_options: settings.fetch_options,
        })
    }
}

/// Effective configuration of one client.
///
/// Fields stay public for callers that need to adjust a live client; the
/// next call picks the change up.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_uri: String,
    pub headers: Headers,
    pub parameters: Parameters,
    /// `None` disables caching.
    pub cache_manager: Option<Arc<dyn CacheManager>>,
    pub retry_settings: RetrySettings,
    pub fetch_options: FetchOptions,
}

impl ClientConfig {
    /// Lays `overrides` over `defaults`.
    pub fn merge(defaults: &ClientDefaults, overrides: ClientOverrides) -> ClientConfig {
        let mut headers = defaults.headers.clone();
        headers.extend(overrides.headers);
        let mut parameters = defaults.parameters.clone();
        parameters.extend(overrides.parameters);

        let cache_manager = match overrides.cache_manager {
            CacheManagerSetting::Inherit => defaults.cache_manager.clone(),
            CacheManagerSetting::Disabled => None,
            CacheManagerSetting::Use(manager) => Some(manager),
        };

        ClientConfig {
            base_uri: overrides.base_uri.unwrap_or_default(),
            headers,
            parameters,
            cache_manager,
            retry_settings: defaults.retry_settings.merge(&overrides.retry_settings),
            fetch_options: defaults.fetch_options.merge(&overrides.fetch_options),
        }
    }
}

/// A client: its configuration and the transport its calls go through.
#[derive(Debug, Clone)]
pub struct BaseClient {
    pub config: ClientConfig,
    transport: reqwest::Client,
    redirect: (Redirect, usize),
}

impl BaseClient {
    /// Builds a client over the [global defaults](ClientDefaults::global).
    pub fn new(overrides: ClientOverrides) -> Result<Self, ConfigError> {
        Self::with_defaults(ClientDefaults::global(), overrides)
    }

    /// Builds a client over explicit defaults.
    pub fn with_defaults(
        defaults: &ClientDefaults,
        overrides: ClientOverrides,
    ) -> Result<Self, ConfigError> {
        let config = ClientConfig::merge(defaults, overrides);
        let redirect = config.fetch_options.redirect_settings();
        Ok(Self {
            transport: build_transport(redirect)?,
            redirect,
            config,
        })
    }

    /// Builds a client over the global defaults from YAML overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::new(ClientOverrides::from_yaml(yaml)?)
    }

    /// Transport honoring the redirect settings of `fetch_options`.
    ///
    /// Redirects are a transport setting, so a call overriding them gets a
    /// transport of its own.
    pub(crate) fn transport(
        &self,
        fetch_options: &FetchOptions,
    ) -> Result<reqwest::Client, ConfigError> {
        let redirect = fetch_options.redirect_settings();
        if redirect == self.redirect {
            Ok(self.transport.clone())
        } else {
            build_transport(redirect)
        }
    }
}

fn build_transport((redirect, follow): (Redirect, usize)) -> Result<reqwest::Client, ConfigError> {
    let policy = match redirect {
        Redirect::Follow => reqwest::redirect::Policy::limited(follow),
        Redirect::Manual => reqwest::redirect::Policy::none(),
        Redirect::Error => reqwest::redirect::Policy::custom(|attempt| {
            attempt.error("redirect mode is set to error")
        }),
    };
    reqwest::Client::builder()
        .redirect(policy)
        .build()
        .map_err(ConfigError::Transport)
}
