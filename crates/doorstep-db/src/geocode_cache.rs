//! Persistent address-to-coordinate cache.
//!
//! Entries never expire: a street address does not move. Only successful
//! resolutions are written; lookups that found no match or failed in
//! transport leave no row behind, so the next resolution retries the
//! provider.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use doorstep_core::{Error, GeoPoint, GeocodeCache, Result};

/// PostgreSQL implementation of the geocode cache.
pub struct PgGeocodeCache {
    pool: PgPool,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS geocode_cache (
    address     TEXT PRIMARY KEY,
    lat         DOUBLE PRECISION NOT NULL,
    lon         DOUBLE PRECISION NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

impl PgGeocodeCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the cache table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl GeocodeCache for PgGeocodeCache {
    async fn get(&self, address: &str) -> Result<Option<GeoPoint>> {
        let row: Option<(f64, f64)> =
            sqlx::query_as("SELECT lat, lon FROM geocode_cache WHERE address = $1")
                .bind(address)
                .fetch_optional(&self.pool)
                .await?;

        debug!(
            subsystem = "db",
            component = "geocode_cache",
            op = "get",
            hit = row.is_some(),
            "Geocode cache lookup"
        );
        Ok(row.map(|(lat, lon)| GeoPoint { lat, lon }))
    }

    async fn put(&self, address: &str, point: GeoPoint) -> Result<()> {
        // First writer wins; concurrent resolutions of the same address are
        // harmless duplicates.
        sqlx::query(
            "INSERT INTO geocode_cache (address, lat, lon) VALUES ($1, $2, $3)
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address)
        .bind(point.lat)
        .bind(point.lon)
        .execute(&self.pool)
        .await?;

        debug!(
            subsystem = "db",
            component = "geocode_cache",
            op = "put",
            "Geocode cache store"
        );
        Ok(())
    }
}
