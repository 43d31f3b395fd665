// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed key-value store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tokio::sync::RwLock;
use tracing::{debug, info};

use tally_core::{AdapterType, HealthStatus, KeyValueStore, PluginAdapter, TallyError};

/// Sets `KEYS[1]` to `max(current, ARGV[1])` in one round trip.
const RAISE_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local floor = tonumber(ARGV[1])
if floor > current then
  redis.call('SET', KEYS[1], floor)
  return floor
end
return current
";

fn kv_err(e: redis::RedisError) -> TallyError {
    TallyError::CounterStore {
        source: Box::new(e),
    }
}

/// A [`KeyValueStore`] on a Redis server.
///
/// The connection is established lazily on first use and then shared;
/// `ConnectionManager` reconnects on its own after a dropped connection.
/// After [`PluginAdapter::shutdown`] the manager is dropped and every call
/// fails.
pub struct RedisStore {
    client: Client,
    conn: RwLock<Option<ConnectionManager>>,
    closed: AtomicBool,
    raise: Script,
}

impl RedisStore {
    /// Parse `url` without connecting.
    pub fn open(url: &str) -> Result<Self, TallyError> {
        let client = Client::open(url)
            .map_err(|e| TallyError::Config(format!("invalid redis url `{url}`: {e}")))?;
        Ok(Self {
            client,
            conn: RwLock::new(None),
            closed: AtomicBool::new(false),
            raise: Script::new(RAISE_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, TallyError> {
        self.ensure_open()?;
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.conn.write().await;
        self.ensure_open()?;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let manager = ConnectionManager::new(self.client.clone())
            .await
            .map_err(kv_err)?;
        info!("connected to redis");
        *slot = Some(manager.clone());
        Ok(manager)
    }

    fn ensure_open(&self) -> Result<(), TallyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TallyError::CounterStore {
                source: "redis store is shut down".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, TallyError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(HealthStatus::Unhealthy("shut down".to_string()));
        }
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(kv_err)?;
        if pong == "PONG" {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!("unexpected PING reply `{pong}`")))
        }
    }

    async fn shutdown(&self) -> Result<(), TallyError> {
        self.closed.store(true, Ordering::Release);
        if self.conn.write().await.take().is_some() {
            debug!("redis connection released");
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, TallyError> {
        let mut conn = self.connection().await?;
        let value: i64 = conn.incr(key, 1i64).await.map_err(kv_err)?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, TallyError> {
        let mut conn = self.connection().await?;
        let value: Option<i64> = conn.get(key).await.map_err(kv_err)?;
        Ok(value)
    }

    async fn raise(&self, key: &str, floor: i64) -> Result<i64, TallyError> {
        let mut conn = self.connection().await?;
        let value: i64 = self
            .raise
            .key(key)
            .arg(floor)
            .invoke_async(&mut conn)
            .await
            .map_err(kv_err)?;
        Ok(value)
    }

    async fn lpush(&self, list: &str, payload: &str) -> Result<u64, TallyError> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.lpush(list, payload).await.map_err(kv_err)?;
        Ok(len)
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>, TallyError> {
        let mut conn = self.connection().await?;
        let item: Option<String> = conn.rpop(list, None).await.map_err(kv_err)?;
        Ok(item)
    }

    async fn llen(&self, list: &str) -> Result<u64, TallyError> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.llen(list).await.map_err(kv_err)?;
        Ok(len)
    }
}
