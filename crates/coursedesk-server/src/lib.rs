pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

pub use crate::config::AppConfig;
pub use error::ApiError;
pub use server::{AppState, CoursedeskServer, ServerBuilder, build_app};

use crate::config::{KvBackend, KvConfig, StorageBackend, StorageConfig};
use coursedesk_db_memory::{InMemoryKeyValueStore, InMemoryRecordStore};
use coursedesk_db_postgres::PostgresRecordStore;
use coursedesk_storage::{KeyValueStore, RecordStore};

use crate::cache::RedisKeyValueStore;

/// How often the in-memory key-value store purges expired entries.
const KV_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Creates the record store named in the configuration.
pub async fn create_record_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory record store");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL record store");
            let store = PostgresRecordStore::new(config.postgres.to_postgres_config()).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Creates the key-value store named in the configuration.
///
/// An unreachable Redis does not prevent startup: the pool reconnects lazily
/// and API requests get 503 until it is back.
pub async fn create_kv_store(config: &KvConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        KvBackend::Memory => {
            tracing::info!("Using in-memory key-value store");
            let store = Arc::new(InMemoryKeyValueStore::new());
            spawn_kv_cleanup(&store);
            Ok(store)
        }
        KvBackend::Redis => {
            tracing::info!(url = %config.url, "Connecting to Redis");

            let mut redis_config = deadpool_redis::Config::from_url(&config.url);
            let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
            pool_config.timeouts = deadpool_redis::Timeouts {
                wait: Some(config.timeout()),
                create: Some(config.timeout()),
                recycle: Some(config.timeout()),
            };
            redis_config.pool = Some(pool_config);

            let pool = redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
            let store = RedisKeyValueStore::new(pool, config.timeout());

            if store.is_connected().await {
                tracing::info!("Connected to Redis successfully");
            } else {
                tracing::warn!(
                    url = %config.url,
                    "Redis is not reachable yet. API requests will be refused until it is."
                );
            }
            Ok(Arc::new(store))
        }
    }
}

fn spawn_kv_cleanup(store: &Arc<InMemoryKeyValueStore>) {
    let store = Arc::downgrade(store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(KV_CLEANUP_INTERVAL);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.upgrade() {
                Some(store) => {
                    store.cleanup_expired();
                }
                None => break,
            }
        }
    });
}
