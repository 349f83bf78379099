//! Redis-backed throttle store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use deadpool_redis::{Config as RedisConfig, Connection, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::debug;

use super::{StoreError, ThrottleStore};
use crate::config::StoreConfig;

const TIMESTAMP_FIELD: &str = "timestamp";

// KEYS[1] = record key, ARGV[1] = expected ("" for none), ARGV[2] = new ("" for none)
const COMPARE_AND_SET: &str = r"
local current = redis.call('HGET', KEYS[1], 'timestamp')
if current == false then current = '' end
if current ~= ARGV[1] then
    return 0
end
if ARGV[2] == '' then
    redis.call('HDEL', KEYS[1], 'timestamp')
else
    redis.call('HSET', KEYS[1], 'timestamp', ARGV[2])
end
return 1
";

/// Throttle record stored as a Redis hash at `{collection}:{document}`
#[derive(Clone)]
pub struct RedisThrottleStore {
    pool: Pool,
    key: String,
}

impl RedisThrottleStore {
    /// Create a new Redis connection pool
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut cfg = RedisConfig::from_url(&config.url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.max_connections as usize));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        Ok(Self {
            pool,
            key: format!("{}:{}", config.collection, config.document),
        })
    }

    /// Key holding the throttle record
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn conn(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))
    }
}

/// Fixed-width RFC 3339 so stored values compare byte-for-byte
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

#[async_trait]
impl ThrottleStore for RedisThrottleStore {
    async fn get_last_sent(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.hget(&self.key, TIMESTAMP_FIELD).await?;

        raw.filter(|value| !value.is_empty())
            .map(|value| decode_timestamp(&value))
            .transpose()
    }

    async fn set_last_sent(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .hset(&self.key, TIMESTAMP_FIELD, encode_timestamp(at))
            .await?;

        debug!(key = %self.key, "Stored last-sent timestamp");
        Ok(())
    }

    async fn compare_and_set(
        &self,
        expected: Option<DateTime<Utc>>,
        new: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let swapped: i32 = Script::new(COMPARE_AND_SET)
            .key(&self.key)
            .arg(expected.map(encode_timestamp).unwrap_or_default())
            .arg(new.map(encode_timestamp).unwrap_or_default())
            .invoke_async(&mut conn)
            .await?;

        Ok(swapped == 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
