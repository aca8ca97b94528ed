//! Connection pools for the two backing stores.
//!
//! The spatial/cache store and the remote registry store are independent
//! databases with independent pools. [`StorePools::connect`] opens both
//! concurrently at startup; nothing else in the workspace creates
//! connections.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use doorstep_core::{Config, Error, Result};

/// Sizing and timeout knobs for one pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long an acquire may wait before failing.
    pub acquire_timeout: Duration,
    /// Idle connections older than this are closed.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn with_min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// One pool per backing store.
pub struct StorePools {
    pub geo: PgPool,
    pub registry: PgPool,
}

impl StorePools {
    /// Open both store pools concurrently with default sizing.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool_config = PoolConfig::default();
        let (geo, registry) = tokio::try_join!(
            create_pool_with_config(&config.geo_database_url, "geo", pool_config.clone()),
            create_pool_with_config(&config.registry_database_url, "registry", pool_config),
        )?;
        Ok(Self { geo, registry })
    }
}

/// Open a single pool with default sizing. `store` labels log events.
pub async fn create_pool(database_url: &str, store: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, store, PoolConfig::default()).await
}

/// Open a single pool with explicit sizing.
pub async fn create_pool_with_config(
    database_url: &str,
    store: &str,
    config: PoolConfig,
) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        store,
        max_connections = config.max_connections,
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Store pool established"
    );
    Ok(pool)
}

/// Emit pool health as a debug event, warning when no connection is idle.
pub fn log_pool_metrics(store: &str, pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        store,
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            store,
            pool_size = size,
            "Pool has no idle connections, nearing exhaustion"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_default_sizing() {
        let config = PoolConfig::new()
            .with_max_connections(20)
            .with_min_connections(5)
            .with_acquire_timeout(Duration::from_secs(60));

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_timeout, PoolConfig::default().idle_timeout);
    }
}
