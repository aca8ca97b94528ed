//! In-memory store backends for deterministic testing.
//!
//! Each backend implements the corresponding storage trait over plain
//! collections and exposes the same failure knobs the geocode mocks do, so
//! orchestrator and warmer behavior can be exercised without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use doorstep_core::defaults::CATEGORY_ALL;
use doorstep_core::{
    haversine_miles, BoundingBox, CacheReadOutcome, CachedRecord, CandidateSet, Error, GeoPoint,
    LocationRecord, RegistryFetcher, Result, ResultCache, SourceRecord, SpatialStore,
};

fn category_matches(row_category: Option<&str>, filter: &str) -> bool {
    filter == CATEGORY_ALL || row_category == Some(filter)
}

/// Spatial store over a fixed location list.
#[derive(Clone)]
pub struct MemorySpatialStore {
    locations: Vec<LocationRecord>,
}

impl MemorySpatialStore {
    pub fn new(locations: Vec<LocationRecord>) -> Self {
        Self { locations }
    }
}

#[async_trait]
impl SpatialStore for MemorySpatialStore {
    async fn locate(&self, origin: GeoPoint, radius_miles: f64) -> Result<CandidateSet> {
        let bbox = BoundingBox::around(origin, radius_miles);
        let records: Vec<LocationRecord> = self
            .locations
            .iter()
            .filter(|l| bbox.contains(l.point()))
            .filter(|l| haversine_miles(origin, l.point()) <= radius_miles)
            .cloned()
            .collect();
        Ok(CandidateSet::from_records(records))
    }

    async fn locate_bbox(&self, bbox: BoundingBox) -> Result<Vec<i64>> {
        Ok(self
            .locations
            .iter()
            .filter(|l| bbox.contains(l.point()))
            .map(|l| l.location_id)
            .collect())
    }
}

/// Result cache over a shared map keyed by (scope, location_id, record_id).
#[derive(Clone, Default)]
pub struct MemoryResultCache {
    rows: Arc<Mutex<HashMap<(String, i64, i64), CachedRecord>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Total rows currently cached, across scopes.
    pub fn row_count(&self) -> usize {
        self.rows.lock().expect("cache poisoned").len()
    }

    /// Insert a row directly, bypassing refresh semantics.
    pub fn seed(&self, row: CachedRecord) {
        let key = (row.scope.clone(), row.location_id, row.record_id);
        self.rows.lock().expect("cache poisoned").insert(key, row);
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn read(
        &self,
        scope: &str,
        location_ids: &[i64],
        category: &str,
        ttl: Duration,
    ) -> Result<CacheReadOutcome> {
        if self.fail_reads {
            return Err(Error::Internal("cache read rejected".to_string()));
        }
        let now = Utc::now();
        let rows = self.rows.lock().expect("cache poisoned");

        let mut fresh: Vec<CachedRecord> = rows
            .values()
            .filter(|r| r.scope == scope)
            .filter(|r| location_ids.contains(&r.location_id))
            .filter(|r| category_matches(r.category.as_deref(), category))
            .filter(|r| r.is_fresh(now, ttl))
            .cloned()
            .collect();
        fresh.sort_by_key(|r| (r.location_id, r.record_id));

        let missing = location_ids
            .iter()
            .copied()
            .filter(|id| !fresh.iter().any(|r| r.location_id == *id))
            .collect();
        Ok(CacheReadOutcome { fresh, missing })
    }

    async fn refresh(
        &self,
        scope: &str,
        location_ids: &[i64],
        rows: &[CachedRecord],
    ) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Internal("cache write rejected".to_string()));
        }
        let mut map = self.rows.lock().expect("cache poisoned");
        map.retain(|(s, location_id, _), _| {
            s != scope || !location_ids.contains(location_id)
        });
        for row in rows {
            let key = (row.scope.clone(), row.location_id, row.record_id);
            map.insert(key, row.clone());
        }
        Ok(())
    }
}

/// Registry fetcher over a fixed source-record list, with a fetch counter.
#[derive(Clone)]
pub struct MemoryRegistry {
    rows: Vec<SourceRecord>,
    fetches: Arc<Mutex<usize>>,
}

impl MemoryRegistry {
    pub fn new(rows: Vec<SourceRecord>) -> Self {
        Self {
            rows,
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of fetch calls made so far.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().expect("counter poisoned")
    }
}

#[async_trait]
impl RegistryFetcher for MemoryRegistry {
    async fn fetch(
        &self,
        _scope: &str,
        location_ids: &[i64],
        category: &str,
    ) -> Result<Vec<SourceRecord>> {
        *self.fetches.lock().expect("counter poisoned") += 1;
        Ok(self
            .rows
            .iter()
            .filter(|r| location_ids.contains(&r.location_id))
            .filter(|r| category_matches(r.category.as_deref(), category))
            .cloned()
            .collect())
    }
}
