//! Redis implementation of the store port.
//!
//! Expiring sets are sorted sets scored by each member's deadline in unix
//! milliseconds. Expired members are pruned on read, and the key itself
//! carries a TTL so idle sets disappear entirely.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use super::{StoreError, StorePort, StoreResult};
use crate::pool::{RedisPool, RedisPoolError, RedisResult};

/// Store port backed by a Redis connection pool
#[derive(Debug, Clone)]
pub struct RedisStore {
    pool: RedisPool,
    command_timeout: Duration,
}

impl RedisStore {
    /// Create a new store; every command is bounded by `command_timeout`
    #[must_use]
    pub fn new(pool: RedisPool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    /// Create a store from realtime-common config
    pub fn from_config(config: &realtime_common::RedisConfig) -> RedisResult<Self> {
        Ok(Self::new(
            RedisPool::from_config(config)?,
            config.command_timeout(),
        ))
    }

    /// Get the underlying pool
    #[must_use]
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Run a command under the configured deadline
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.command_timeout)),
        }
    }
}

/// TTL in whole seconds; Redis rejects a zero expiry
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn deadline_millis(ttl: Duration) -> i64 {
    now_millis() + i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX / 2)
}

#[async_trait]
impl StorePort for RedisStore {
    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
            Ok::<_, RedisPoolError>(())
        })
        .await
    }

    async fn set_value_if_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs(ttl))
                .arg("XX")
                .query_async(&mut conn)
                .await?;
            Ok::<_, RedisPoolError>(reply.is_some())
        })
        .await
    }

    async fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, RedisPoolError>(value)
        })
        .await
    }

    async fn delete_many(&self, keys: &[&str]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(async {
            let mut conn = self.pool.get().await?;
            let deleted: u64 = conn.del(keys).await?;
            Ok::<_, RedisPoolError>(deleted)
        })
        .await
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            let (count,): (i64,) = redis::pipe()
                .atomic()
                .incr(key, 1)
                .expire(key, ttl_secs(ttl) as i64)
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok::<_, RedisPoolError>(count)
        })
        .await
    }

    async fn expiring_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            redis::pipe()
                .atomic()
                .zadd(key, member, deadline_millis(ttl))
                .ignore()
                .expire(key, ttl_secs(ttl) as i64)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            Ok::<_, RedisPoolError>(())
        })
        .await
    }

    async fn expiring_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = now_millis();
        self.run(async {
            let mut conn = self.pool.get().await?;
            let (score, removed): (Option<f64>, u64) = redis::pipe()
                .atomic()
                .zscore(key, member)
                .zrem(key, member)
                .query_async(&mut conn)
                .await?;
            Ok::<_, RedisPoolError>(removed > 0 && score.is_some_and(|s| s > now as f64))
        })
        .await
    }

    async fn expiring_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = now_millis();
        self.run(async {
            let mut conn = self.pool.get().await?;
            let (members,): (Vec<String>,) = redis::pipe()
                .atomic()
                .zrembyscore(key, "-inf", now)
                .ignore()
                .zrangebyscore(key, format!("({now}"), "+inf")
                .query_async(&mut conn)
                .await?;
            Ok::<_, RedisPoolError>(members)
        })
        .await
    }

    async fn expiring_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = now_millis();
        self.run(async {
            let mut conn = self.pool.get().await?;
            let score: Option<f64> = conn.zscore(key, member).await?;
            Ok::<_, RedisPoolError>(score.is_some_and(|s| s > now as f64))
        })
        .await
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<u32> {
        self.run(async {
            let mut conn = self.pool.get().await?;
            let receivers: u32 = conn.publish(channel, payload).await?;
            Ok::<_, RedisPoolError>(receivers)
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.run(self.pool.health_check()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::RedisPoolConfig;

    #[test]
    fn test_ttl_secs_never_zero() {
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
    }

    #[test]
    fn test_deadline_is_in_the_future() {
        let before = now_millis();
        let deadline = deadline_millis(Duration::from_secs(10));
        assert!(deadline >= before + 10_000);
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_unavailable() {
        // Port 1 is never a Redis server; the connect fails or the deadline fires.
        let pool = RedisPool::new(RedisPoolConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 1,
        })
        .unwrap();
        let store = RedisStore::new(pool, Duration::from_millis(500));

        let err = store.get_value("presence:alice").await.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
    }
}
