//! Remote registry fetcher with pluggable join strategies.
//!
//! The registry store exposes three relations: `registry` (record id, scope,
//! location foreign key, category, expiration sentinel), `contacts` (keyed to
//! the registry record), and `addresses` (keyed to the location id). Only
//! registry rows whose expiration equals the active sentinel are visible.
//!
//! A fetch partitions its location ids into bounded chunks and runs the
//! chunk queries concurrently under a configured limit. Chunks are read-only
//! and mutually independent; each carries its index so results concatenate in
//! chunk order no matter when the queries complete.
//!
//! The four join strategies are functionally equivalent — identical row sets
//! for identical inputs — and differ only in how the chunk's id list
//! participates in the join (query-plan steering on large registries).

use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use sqlx::{PgPool, Row};
use tracing::debug;

use doorstep_core::defaults::{
    ACTIVE_SENTINEL, CATEGORY_ALL, FETCH_CHUNK_SIZE, FETCH_CONCURRENCY,
};
use doorstep_core::{JoinStrategy, RegistryFetcher, Result, SourceRecord};

/// Fetcher configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// How the chunk id list participates in the join.
    pub strategy: JoinStrategy,
    /// Location ids per chunk query.
    pub chunk_size: usize,
    /// Maximum chunk queries in flight at once.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            strategy: JoinStrategy::default(),
            chunk_size: FETCH_CHUNK_SIZE,
            concurrency: FETCH_CONCURRENCY,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }
}

/// PostgreSQL implementation of the registry fetcher.
pub struct PgRegistryFetcher {
    pool: PgPool,
    config: FetchConfig,
    active_sentinel: NaiveDate,
}

// Shared projection: the address is composed as a multi-line value (street
// line, then secondary line + unit when present).
const PROJECTION: &str = r#"r.record_id, r.location_id,
       c.display_name, c.first_name, c.last_name, c.email, c.phone, c.birth_date,
       r.category,
       concat_ws(E'\n', a.street_address,
                 nullif(btrim(concat_ws(' ', a.address_line2, a.unit)), '')) AS address"#;

impl PgRegistryFetcher {
    /// Create a fetcher with default configuration.
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, FetchConfig::default())
    }

    /// Create a fetcher with explicit configuration.
    pub fn with_config(pool: PgPool, config: FetchConfig) -> Self {
        let active_sentinel = NaiveDate::parse_from_str(ACTIVE_SENTINEL, "%Y-%m-%d")
            .expect("active sentinel is a valid date");
        Self {
            pool,
            config,
            active_sentinel,
        }
    }

    /// The configured join strategy.
    pub fn strategy(&self) -> JoinStrategy {
        self.config.strategy
    }

    fn base_where(with_category: bool) -> (&'static str, &'static str) {
        // Returns (WHERE fragment, bind placeholder for the id array).
        if with_category {
            ("r.scope = $1 AND r.expires_on = $2 AND r.category = $3", "$4")
        } else {
            ("r.scope = $1 AND r.expires_on = $2", "$3")
        }
    }

    fn chunk_sql(strategy: JoinStrategy, with_category: bool) -> String {
        let (base, ids) = Self::base_where(with_category);
        match strategy {
            JoinStrategy::RegistryDriven => format!(
                "SELECT {PROJECTION}\n\
                 FROM registry r\n\
                 JOIN contacts c ON c.record_id = r.record_id\n\
                 JOIN addresses a ON a.location_id = r.location_id\n\
                 WHERE {base} AND r.location_id = ANY({ids})"
            ),
            JoinStrategy::AddressDriven => format!(
                "SELECT {PROJECTION}\n\
                 FROM addresses a\n\
                 JOIN registry r ON r.location_id = a.location_id\n\
                 JOIN contacts c ON c.record_id = r.record_id\n\
                 WHERE {base} AND a.location_id = ANY({ids})"
            ),
            JoinStrategy::DerivedTable => format!(
                "SELECT {PROJECTION}\n\
                 FROM unnest({ids}::bigint[]) AS ids(location_id)\n\
                 JOIN registry r ON r.location_id = ids.location_id\n\
                 JOIN contacts c ON c.record_id = r.record_id\n\
                 JOIN addresses a ON a.location_id = r.location_id\n\
                 WHERE {base}"
            ),
            // TwoStep builds its own statements.
            JoinStrategy::TwoStep => unreachable!("two-step uses probe_sql/rows_sql"),
        }
    }

    fn probe_sql(with_category: bool) -> String {
        let (base, ids) = Self::base_where(with_category);
        format!(
            "SELECT r.record_id\n\
             FROM unnest({ids}::bigint[]) AS ids(location_id)\n\
             JOIN registry r ON r.location_id = ids.location_id\n\
             WHERE {base}"
        )
    }

    fn rows_sql(with_category: bool) -> String {
        let (base, ids) = Self::base_where(with_category);
        format!(
            "SELECT {PROJECTION}\n\
             FROM registry r\n\
             JOIN contacts c ON c.record_id = r.record_id\n\
             JOIN addresses a ON a.location_id = r.location_id\n\
             WHERE {base} AND r.record_id = ANY({ids})"
        )
    }

    async fn fetch_chunk(
        &self,
        scope: &str,
        chunk: &[i64],
        category: &str,
    ) -> Result<Vec<SourceRecord>> {
        let with_category = category != CATEGORY_ALL;
        let ids = chunk.to_vec();

        if self.config.strategy == JoinStrategy::TwoStep {
            // Diagnostic variant: probe for record ids first, then fetch the
            // full rows keyed by record id.
            let sql = Self::probe_sql(with_category);
            let mut probe = sqlx::query(&sql).bind(scope).bind(self.active_sentinel);
            if with_category {
                probe = probe.bind(category);
            }
            let record_ids: Vec<i64> = probe
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| row.get::<i64, _>("record_id"))
                .collect();

            if record_ids.is_empty() {
                return Ok(Vec::new());
            }

            let sql = Self::rows_sql(with_category);
            let mut query = sqlx::query_as::<_, SourceRecord>(&sql)
                .bind(scope)
                .bind(self.active_sentinel);
            if with_category {
                query = query.bind(category);
            }
            return Ok(query.bind(record_ids).fetch_all(&self.pool).await?);
        }

        let sql = Self::chunk_sql(self.config.strategy, with_category);
        let mut query = sqlx::query_as::<_, SourceRecord>(&sql)
            .bind(scope)
            .bind(self.active_sentinel);
        if with_category {
            query = query.bind(category);
        }
        Ok(query.bind(ids).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl RegistryFetcher for PgRegistryFetcher {
    async fn fetch(
        &self,
        scope: &str,
        location_ids: &[i64],
        category: &str,
    ) -> Result<Vec<SourceRecord>> {
        if location_ids.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let chunks = chunk_ids(location_ids, self.config.chunk_size);
        let chunk_count = chunks.len();

        let mut completed: Vec<(usize, usize, Result<Vec<SourceRecord>>)> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(index, chunk)| async move {
                    let chunk_start = Instant::now();
                    let rows = self.fetch_chunk(scope, &chunk, category).await;
                    debug!(
                        subsystem = "db",
                        component = "registry",
                        op = "fetch_chunk",
                        chunk_index = index,
                        chunk_ids = chunk.len(),
                        result_count = rows.as_ref().map(Vec::len).unwrap_or(0),
                        duration_ms = chunk_start.elapsed().as_millis() as u64,
                        "Chunk fetched"
                    );
                    (index, chunk.len(), rows)
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        // Re-sort by chunk index: concatenation order is deterministic even
        // though completion order is not.
        completed.sort_by_key(|(index, _, _)| *index);

        let mut records = Vec::new();
        for (_, _, rows) in completed {
            records.extend(rows?);
        }

        debug!(
            subsystem = "db",
            component = "registry",
            op = "fetch",
            scope,
            category,
            strategy = %self.config.strategy,
            chunk_count,
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Registry fetch complete"
        );
        Ok(records)
    }
}

/// Partition `ids` into chunks of at most `size`, preserving order.
pub fn chunk_ids(ids: &[i64], size: usize) -> Vec<Vec<i64>> {
    let size = size.max(1);
    ids.chunks(size).map(|c| c.to_vec()).collect()
}
