//! Core traits for doorstep abstractions.
//!
//! One trait per external collaborator, enabling pluggable backends and
//! testability: the geocoding provider and its persistent cache, the
//! spatial/candidate store, the local result cache, and the remote registry
//! fetcher.

use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::geo::BoundingBox;
use crate::models::{CachedRecord, CandidateSet, GeoPoint, SourceRecord};

/// External geocoding provider: free-text address to coordinate.
///
/// `Ok(None)` means the provider answered but had no match; errors are
/// transport failures or timeouts. Implementations issue exactly one request
/// per call and never retry.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>>;
}

/// Persistent geocode cache keyed by exact address text (no normalization).
///
/// Entries are immutable once written and the cache grows monotonically; a
/// failed provider lookup is never cached, so a later retry can succeed.
#[async_trait]
pub trait GeocodeCache: Send + Sync {
    async fn get(&self, address: &str) -> Result<Option<GeoPoint>>;

    async fn put(&self, address: &str, point: GeoPoint) -> Result<()>;
}

/// Spatial/candidate store: geocoded-location lookups.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Locations within `radius_miles` of `origin`: bounding-box prefilter,
    /// then exact great-circle refine. The result is deduplicated by
    /// location id.
    async fn locate(&self, origin: GeoPoint, radius_miles: f64) -> Result<CandidateSet>;

    /// Location ids inside an explicit bounding box (prefilter only, no
    /// distance refine). Used by the batch-warm utility's bbox id source.
    async fn locate_bbox(&self, bbox: BoundingBox) -> Result<Vec<i64>>;
}

/// Partition of a cache read into fresh rows and the location ids no fresh
/// row covers.
#[derive(Debug, Clone, Default)]
pub struct CacheReadOutcome {
    pub fresh: Vec<CachedRecord>,
    pub missing: Vec<i64>,
}

/// TTL-bounded local store of previously joined records, keyed by
/// (scope, location_id, record_id).
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Partition `location_ids` into fresh cached rows and missing ids.
    ///
    /// A row is fresh when its scope matches, its location id is requested,
    /// its category matches (or the filter is the `ALL` wildcard), and
    /// `now - updated_at <= ttl`. Idempotent: identical arguments with no
    /// intervening write return the identical partition.
    async fn read(
        &self,
        scope: &str,
        location_ids: &[i64],
        category: &str,
        ttl: Duration,
    ) -> Result<CacheReadOutcome>;

    /// Replace every cached row for (scope, each id in `location_ids`) with
    /// `rows`, atomically. Serialized per scope; a failure must be treated
    /// as non-fatal by retrieval callers.
    async fn refresh(
        &self,
        scope: &str,
        location_ids: &[i64],
        rows: &[CachedRecord],
    ) -> Result<()>;
}

/// Remote registry fetcher: joined records for a set of location ids.
///
/// Join strategy and chunk size are fixed at construction from
/// configuration, not re-derived per call.
#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    /// Fetch active registry rows joined to contact and address attributes,
    /// restricted to `scope`, optionally to `category`, for `location_ids`.
    /// Executed in bounded-size chunks; results are concatenated in chunk
    /// order.
    async fn fetch(
        &self,
        scope: &str,
        location_ids: &[i64],
        category: &str,
    ) -> Result<Vec<SourceRecord>>;
}
