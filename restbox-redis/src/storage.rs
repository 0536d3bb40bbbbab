//! Redis storage implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{Cmd, FromRedisValue, aio::ConnectionManager};
use restbox_backend::{BackendResult, DeleteStatus, Format, Storage};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;
use crate::{REDACTED_CLUSTER, REDACTED_CONNECTION};

/// Number of keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 100;

/// Single-node connection settings.
#[derive(Debug, Clone)]
pub struct SingleConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
}

/// Cluster connection settings.
#[cfg(feature = "cluster")]
#[cfg_attr(docsrs, doc(cfg(feature = "cluster")))]
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Seed node URLs.
    pub nodes: Vec<String>,
}

/// Where the storage connects to.
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// One Redis server.
    Single(SingleConfig),
    /// A Redis cluster.
    #[cfg(feature = "cluster")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cluster")))]
    Cluster(ClusterConfig),
}

impl ConnectionMode {
    /// Single-node mode.
    pub fn single(url: impl Into<String>) -> Self {
        Self::Single(SingleConfig { url: url.into() })
    }

    /// Cluster mode from seed node URLs.
    #[cfg(feature = "cluster")]
    #[cfg_attr(docsrs, doc(cfg(feature = "cluster")))]
    pub fn cluster(nodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Cluster(ClusterConfig {
            nodes: nodes.into_iter().map(Into::into).collect(),
        })
    }
}

#[derive(Clone)]
enum Client {
    Single(redis::Client),
    #[cfg(feature = "cluster")]
    Cluster(redis::cluster::ClusterClient),
}

#[derive(Clone)]
enum Connection {
    Single(ConnectionManager),
    #[cfg(feature = "cluster")]
    Cluster(redis::cluster_async::ClusterConnection),
}

/// Redis storage based on the redis-rs crate.
///
/// The connection is opened on first use. Clones taken after that share it,
/// clones taken earlier open their own.
#[derive(Clone)]
pub struct RedisStorage {
    client: Client,
    connection: OnceCell<Connection>,
    format: Format,
    name: String,
}

impl RedisStorage {
    /// Creates a new [`RedisStorageBuilder`].
    #[must_use]
    pub fn builder() -> RedisStorageBuilder {
        RedisStorageBuilder::default()
    }

    /// Returns `true` when the storage talks to a cluster.
    pub fn is_cluster(&self) -> bool {
        !matches!(self.client, Client::Single(_))
    }

    async fn connection(&self) -> Result<&Connection, Error> {
        trace!("Get redis connection");
        let connection = self
            .connection
            .get_or_try_init(|| async {
                trace!("Initialize new redis connection");
                match &self.client {
                    Client::Single(client) => client
                        .get_connection_manager()
                        .await
                        .map(Connection::Single),
                    #[cfg(feature = "cluster")]
                    Client::Cluster(client) => client
                        .get_async_connection()
                        .await
                        .map(Connection::Cluster),
                }
            })
            .await?;
        Ok(connection)
    }

    async fn query<T>(&self, cmd: &Cmd) -> Result<T, Error>
    where
        T: FromRedisValue,
    {
        match self.connection().await?.clone() {
            Connection::Single(mut con) => Ok(cmd.query_async(&mut con).await?),
            #[cfg(feature = "cluster")]
            Connection::Cluster(mut con) => Ok(cmd.query_async(&mut con).await?),
        }
    }

    /// Sends `QUIT` and returns `true` when the server answered `OK`.
    ///
    /// Returns `false` without connecting when no connection was ever opened.
    pub async fn quit(&self) -> Result<bool, Error> {
        if !self.connection.initialized() {
            return Ok(false);
        }
        let reply: String = self.query(&redis::cmd("QUIT")).await?;
        Ok(reply == "OK")
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);
            let (next, batch): (u64, Vec<String>) = self.query(&cmd).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("name", &self.name)
            .field("cluster", &self.is_cluster())
            .field("format", &self.format)
            .finish()
    }
}

/// Escapes glob metacharacters so that `prefix` is matched literally.
fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

/// Builder for [`RedisStorage`].
pub struct RedisStorageBuilder {
    mode: Option<ConnectionMode>,
    format: Format,
    name: String,
}

impl Default for RedisStorageBuilder {
    fn default() -> Self {
        Self {
            mode: None,
            format: Format::Bincode,
            name: "redis".to_owned(),
        }
    }
}

impl RedisStorageBuilder {
    /// Sets the connection mode.
    pub fn connection(mut self, mode: ConnectionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the value serialization format. Default: [`Format::Bincode`].
    pub fn value_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Sets the name reported in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Creates the storage. No connection is opened yet.
    pub fn build(self) -> Result<RedisStorage, Error> {
        let client = match self.mode.ok_or(Error::MissingConnectionMode)? {
            ConnectionMode::Single(config) => Client::Single(redis::Client::open(config.url)?),
            #[cfg(feature = "cluster")]
            ConnectionMode::Cluster(config) => {
                Client::Cluster(redis::cluster::ClusterClient::new(config.nodes)?)
            }
        };
        Ok(RedisStorage {
            client,
            connection: OnceCell::new(),
            format: self.format,
            name: self.name,
        })
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn read(&self, key: &str) -> BackendResult<Option<Bytes>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let data: Option<Vec<u8>> = self.query(&cmd).await?;
        Ok(data.map(Bytes::from))
    }

    async fn write(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> BackendResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value.as_ref());
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        self.query::<()>(&cmd).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> BackendResult<DeleteStatus> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let deleted: i32 = self.query(&cmd).await?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted)
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn keys(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let pattern = glob_prefix(prefix);
        match self.client {
            Client::Single(_) => Ok(self.scan(&pattern).await?),
            #[cfg(feature = "cluster")]
            Client::Cluster(_) => {
                let mut cmd = redis::cmd("KEYS");
                cmd.arg(&pattern);
                Ok(self.query(&cmd).await?)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn value_format(&self) -> Format {
        self.format
    }

    fn describe(&self) -> serde_json::Value {
        let connection = if self.is_cluster() {
            REDACTED_CLUSTER
        } else {
            REDACTED_CONNECTION
        };
        serde_json::json!({
            "name": self.name,
            "format": format!("{:?}", self.format),
            "connection": connection,
        })
    }
}
