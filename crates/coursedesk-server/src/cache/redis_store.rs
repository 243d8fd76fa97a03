//! Redis-backed key-value store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use coursedesk_storage::{KeyValueStore, KvError};

/// [`KeyValueStore`] over a `deadpool-redis` pool.
///
/// Every command is bounded by `timeout`, so a stalled server surfaces as
/// [`KvError::Unavailable`] instead of hanging the request.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    pool: Pool,
    timeout: Duration,
}

impl RedisKeyValueStore {
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> Result<Connection, KvError> {
        self.pool
            .get()
            .await
            .map_err(|e| KvError::unavailable(format!("failed to get Redis connection: {e}")))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, KvError>
    where
        F: Future<Output = Result<T, KvError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(KvError::unavailable(format!(
                "Redis {op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

fn map_redis_error(key: &str, err: redis::RedisError) -> KvError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        KvError::unavailable(err.to_string())
    } else if err.to_string().contains("not an integer") {
        KvError::wrong_type(key)
    } else {
        KvError::command(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.bounded("GET", async {
            let mut conn = self.connection().await?;
            conn.get::<_, Option<Vec<u8>>>(key)
                .await
                .map_err(|e| map_redis_error(key, e))
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        // PSETEX rejects a zero expiry
        let millis = ttl.as_millis().clamp(1, u64::MAX as u128) as u64;
        self.bounded("PSETEX", async {
            let mut conn = self.connection().await?;
            conn.pset_ex::<_, _, ()>(key, value, millis)
                .await
                .map_err(|e| map_redis_error(key, e))
        })
        .await
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let millis = ttl.as_millis().clamp(1, i64::MAX as u128) as i64;
        self.bounded("INCR", async {
            let mut conn = self.connection().await?;
            let (count, _): (i64, i64) = redis::pipe()
                .atomic()
                .incr(key, 1)
                .pexpire(key, millis)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error(key, e))?;
            Ok(count)
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.bounded("EXISTS", async {
            let mut conn = self.connection().await?;
            conn.exists::<_, bool>(key)
                .await
                .map_err(|e| map_redis_error(key, e))
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.bounded("DEL", async {
            let mut conn = self.connection().await?;
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| map_redis_error(key, e))
        })
        .await
    }

    async fn is_connected(&self) -> bool {
        let probe = self.bounded("PING", async {
            let mut conn = self.connection().await?;
            let pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("", e))?;
            Ok(pong)
        });
        match probe.await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Redis ping failed");
                false
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
