//! Registry fetch behavior against a live registry store.
//!
//! Needs a PostgreSQL instance; skipped when `DOORSTEP_TEST_REGISTRY_DB_URL`
//! is not set. The test owns its schema and seeds a unique scope per run.

use chrono::NaiveDate;
use doorstep_core::{JoinStrategy, RegistryFetcher, SourceRecord};
use doorstep_db::{FetchConfig, PgRegistryFetcher};
use sqlx::PgPool;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS registry (
    record_id    BIGINT PRIMARY KEY,
    scope        TEXT NOT NULL,
    location_id  BIGINT NOT NULL,
    category     TEXT,
    expires_on   DATE NOT NULL
);
CREATE TABLE IF NOT EXISTS contacts (
    record_id    BIGINT PRIMARY KEY,
    display_name TEXT,
    first_name   TEXT,
    last_name    TEXT,
    email        TEXT,
    phone        TEXT,
    birth_date   DATE
);
CREATE TABLE IF NOT EXISTS addresses (
    location_id   BIGINT PRIMARY KEY,
    street_address TEXT,
    address_line2 TEXT,
    unit          TEXT
);
"#;

async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DOORSTEP_TEST_REGISTRY_DB_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DOORSTEP_TEST_REGISTRY_DB_URL not set, skipping");
            return None;
        }
    };
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&pool)
        .await
        .expect("schema");
    Some(pool)
}

fn active() -> NaiveDate {
    NaiveDate::from_ymd_opt(2100, 12, 31).expect("date")
}

/// Seed `count` records under `scope`, one per location, starting at
/// `base` for both ids. Every even record is DEM, odd REP. Record `base`
/// additionally gets an expired twin that no fetch may return.
async fn seed(pool: &PgPool, scope: &str, base: i64, count: i64) {
    for i in 0..count {
        let record_id = base + i;
        let location_id = base + i;
        let category = if i % 2 == 0 { "DEM" } else { "REP" };
        sqlx::query(
            "INSERT INTO registry (record_id, scope, location_id, category, expires_on)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record_id)
        .bind(scope)
        .bind(location_id)
        .bind(category)
        .bind(active())
        .execute(pool)
        .await
        .expect("seed registry");

        sqlx::query(
            "INSERT INTO contacts (record_id, display_name, first_name, last_name)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(record_id)
        .bind(format!("Resident {record_id}"))
        .bind("Test")
        .bind("Resident")
        .execute(pool)
        .await
        .expect("seed contacts");

        sqlx::query(
            "INSERT INTO addresses (location_id, street_address, address_line2, unit)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (location_id) DO NOTHING",
        )
        .bind(location_id)
        .bind(format!("{} Grand Ave", i + 1))
        .bind(if i % 3 == 0 { Some("Apt") } else { None })
        .bind(if i % 3 == 0 { Some("2B") } else { None })
        .execute(pool)
        .await
        .expect("seed addresses");
    }

    // An expired row at the first location; must never surface.
    sqlx::query(
        "INSERT INTO registry (record_id, scope, location_id, category, expires_on)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(base + count)
    .bind(scope)
    .bind(base)
    .bind("DEM")
    .bind(NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"))
    .execute(pool)
    .await
    .expect("seed expired");
    sqlx::query("INSERT INTO contacts (record_id) VALUES ($1)")
        .bind(base + count)
        .execute(pool)
        .await
        .expect("seed expired contact");
}

fn sorted_ids(rows: &[SourceRecord]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().map(|r| r.record_id).collect();
    ids.sort_unstable();
    ids
}

fn unique_base() -> i64 {
    use std::sync::atomic::{AtomicI64, Ordering};
    // Millisecond clock separates runs; the counter separates tests that
    // start in the same millisecond.
    static NEXT: AtomicI64 = AtomicI64::new(0);
    chrono::Utc::now().timestamp_millis() * 1_000 + NEXT.fetch_add(100_000, Ordering::Relaxed)
}

#[tokio::test]
async fn all_join_strategies_return_the_same_rows() {
    let Some(pool) = test_pool().await else { return };
    let scope = format!("EQ-{}", chrono::Utc::now().timestamp_millis());
    let base = unique_base();
    seed(&pool, &scope, base, 7).await;

    let ids: Vec<i64> = (base..base + 7).collect();
    let mut baselines: Vec<(JoinStrategy, Vec<i64>)> = Vec::new();
    for strategy in [
        JoinStrategy::RegistryDriven,
        JoinStrategy::AddressDriven,
        JoinStrategy::DerivedTable,
        JoinStrategy::TwoStep,
    ] {
        let fetcher = PgRegistryFetcher::with_config(
            pool.clone(),
            FetchConfig::new().with_strategy(strategy),
        );
        let rows = fetcher.fetch(&scope, &ids, "ALL").await.expect("fetch");
        assert_eq!(rows.len(), 7, "{strategy} row count");
        baselines.push((strategy, sorted_ids(&rows)));
    }
    for window in baselines.windows(2) {
        assert_eq!(window[0].1, window[1].1);
    }
}

#[tokio::test]
async fn category_filter_and_sentinel_restrict_rows() {
    let Some(pool) = test_pool().await else { return };
    let scope = format!("CF-{}", chrono::Utc::now().timestamp_millis());
    let base = unique_base();
    seed(&pool, &scope, base, 6).await;

    let ids: Vec<i64> = (base..base + 6).collect();
    let fetcher = PgRegistryFetcher::new(pool);

    let all = fetcher.fetch(&scope, &ids, "ALL").await.expect("fetch");
    // 6 active rows; the expired twin at the first location is excluded.
    assert_eq!(all.len(), 6);

    let dem = fetcher.fetch(&scope, &ids, "DEM").await.expect("fetch");
    assert_eq!(dem.len(), 3);
    assert!(dem.iter().all(|r| r.category.as_deref() == Some("DEM")));
}

#[tokio::test]
async fn chunked_fetch_covers_every_id_exactly_once() {
    let Some(pool) = test_pool().await else { return };
    let scope = format!("CH-{}", chrono::Utc::now().timestamp_millis());
    let base = unique_base();
    seed(&pool, &scope, base, 25).await;

    let ids: Vec<i64> = (base..base + 25).collect();
    let fetcher = PgRegistryFetcher::with_config(
        pool,
        FetchConfig::new().with_chunk_size(10).with_concurrency(3),
    );

    let rows = fetcher.fetch(&scope, &ids, "ALL").await.expect("fetch");
    assert_eq!(sorted_ids(&rows), ids);
}

#[tokio::test]
async fn address_projection_is_multi_line_with_optional_second_line() {
    let Some(pool) = test_pool().await else { return };
    let scope = format!("AD-{}", chrono::Utc::now().timestamp_millis());
    let base = unique_base();
    seed(&pool, &scope, base, 2).await;

    let fetcher = PgRegistryFetcher::new(pool);
    let rows = fetcher
        .fetch(&scope, &[base, base + 1], "ALL")
        .await
        .expect("fetch");

    // Record 0 has a line2 + unit, record 1 does not.
    let with_unit = rows.iter().find(|r| r.record_id == base).expect("row");
    assert_eq!(with_unit.address.as_deref(), Some("1 Grand Ave\nApt 2B"));
    let without = rows.iter().find(|r| r.record_id == base + 1).expect("row");
    assert_eq!(without.address.as_deref(), Some("2 Grand Ave"));
}
