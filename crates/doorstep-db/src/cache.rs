//! Local result cache keyed by (scope, location_id, record_id).
//!
//! `read` partitions a requested id set into fresh rows and missing ids.
//! `refresh` replaces every row for (scope, ids) inside a single transaction:
//! the delete and the batched inserts commit together, so a half-applied
//! refresh is never visible and cancellation before commit leaves the cache
//! untouched. Refreshes are additionally serialized per scope in-process
//! (single-logical-writer assumption; see DESIGN.md).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use doorstep_core::defaults::{CACHE_INSERT_BATCH, CATEGORY_ALL};
use doorstep_core::{CacheReadOutcome, CachedRecord, Error, Result, ResultCache};

/// PostgreSQL implementation of the result cache.
pub struct PgResultCache {
    pool: PgPool,
    refresh_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cached_records (
    scope        TEXT NOT NULL,
    location_id  BIGINT NOT NULL,
    record_id    BIGINT NOT NULL,
    display_name TEXT,
    first_name   TEXT,
    last_name    TEXT,
    email        TEXT,
    phone        TEXT,
    birth_date   DATE,
    category     TEXT,
    address      TEXT,
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (scope, location_id, record_id)
);
CREATE INDEX IF NOT EXISTS idx_cached_records_location ON cached_records (location_id);
CREATE INDEX IF NOT EXISTS idx_cached_records_category ON cached_records (category);
"#;

const COLUMNS: &str = "scope, location_id, record_id, display_name, first_name, last_name, \
                       email, phone, birth_date, category, address, updated_at";

impl PgResultCache {
    /// Create a new result cache on the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            refresh_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Create the cache table and indexes when absent (first use).
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    fn scope_lock(&self, scope: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .expect("refresh lock map poisoned");
        locks
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl ResultCache for PgResultCache {
    async fn read(
        &self,
        scope: &str,
        location_ids: &[i64],
        category: &str,
        ttl: Duration,
    ) -> Result<CacheReadOutcome> {
        if location_ids.is_empty() {
            return Ok(CacheReadOutcome::default());
        }

        let start = Instant::now();
        let cutoff = Utc::now() - ttl;
        let ids = location_ids.to_vec();

        let mut sql = format!(
            "SELECT {COLUMNS} FROM cached_records \
             WHERE scope = $1 AND location_id = ANY($2) AND updated_at >= $3"
        );
        if category != CATEGORY_ALL {
            sql.push_str(" AND category = $4");
        }
        sql.push_str(" ORDER BY location_id, record_id");

        let mut query = sqlx::query_as::<_, CachedRecord>(&sql)
            .bind(scope)
            .bind(&ids)
            .bind(cutoff);
        if category != CATEGORY_ALL {
            query = query.bind(category);
        }
        let fresh = query.fetch_all(&self.pool).await?;

        let covered: HashSet<i64> = fresh.iter().map(|r| r.location_id).collect();
        let mut seen = HashSet::new();
        let missing: Vec<i64> = location_ids
            .iter()
            .copied()
            .filter(|id| !covered.contains(id) && seen.insert(*id))
            .collect();

        debug!(
            subsystem = "db",
            component = "result_cache",
            op = "read",
            scope,
            category,
            result_count = fresh.len(),
            missing_count = missing.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Cache read partitioned"
        );
        Ok(CacheReadOutcome { fresh, missing })
    }

    async fn refresh(
        &self,
        scope: &str,
        location_ids: &[i64],
        rows: &[CachedRecord],
    ) -> Result<()> {
        if location_ids.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let lock = self.scope_lock(scope);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM cached_records WHERE scope = $1 AND location_id = ANY($2)")
            .bind(scope)
            .bind(location_ids.to_vec())
            .execute(&mut *tx)
            .await?;

        for batch in rows.chunks(CACHE_INSERT_BATCH) {
            let mut sql = format!("INSERT INTO cached_records ({COLUMNS}) VALUES ");
            for (i, _) in batch.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let base = i * 12;
                sql.push('(');
                for p in 1..=12 {
                    if p > 1 {
                        sql.push_str(", ");
                    }
                    sql.push_str(&format!("${}", base + p));
                }
                sql.push(')');
            }

            let mut query = sqlx::query(&sql);
            for row in batch {
                query = query
                    .bind(&row.scope)
                    .bind(row.location_id)
                    .bind(row.record_id)
                    .bind(&row.display_name)
                    .bind(&row.first_name)
                    .bind(&row.last_name)
                    .bind(&row.email)
                    .bind(&row.phone)
                    .bind(row.birth_date)
                    .bind(&row.category)
                    .bind(&row.address)
                    .bind(row.updated_at);
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "result_cache",
            op = "refresh",
            scope,
            location_count = location_ids.len(),
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Cache refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_batch_constant_matches_statement_budget() {
        // 12 columns per row; the batch keeps bind counts well under the
        // Postgres u16 parameter limit.
        assert!(CACHE_INSERT_BATCH * 12 < u16::MAX as usize);
    }
}
