use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{info, instrument};

use crate::config::PostgresConfig;
use crate::error::Result;

/// Opens the connection pool. One idle connection is kept warm.
#[instrument(skip(config), fields(url = %config.redacted_url()))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let pool = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .min_connections(1)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .connect(&config.url)
        .await?;

    info!(pool_size = config.pool_size, "PostgreSQL pool ready");
    Ok(pool)
}
