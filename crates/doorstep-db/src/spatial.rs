//! Spatial/candidate store queries.
//!
//! The geocoded-location relation is owned by an external system and is
//! read-only here. `locate` runs the two-phase candidate query: an indexable
//! lat/lon range predicate (the bounding box) shrinks the scan, then an exact
//! great-circle expression removes corner false positives, all in one
//! statement.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use doorstep_core::defaults::EARTH_RADIUS_MILES;
use doorstep_core::{
    BoundingBox, CandidateSet, GeoPoint, LocationRecord, Result, SpatialStore,
};

/// PostgreSQL implementation of the spatial store.
pub struct PgSpatialStore {
    pool: PgPool,
}

impl PgSpatialStore {
    /// Create a new spatial store on the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Haversine in SQL: $5/$6 are the origin, $7 the earth radius, $8 the
// radius limit in miles. least() clamps rounding noise before asin.
const LOCATE_SQL: &str = r#"
SELECT location_id, lat, lon, full_address, scope
FROM geocoded_locations
WHERE lat BETWEEN $1 AND $2
  AND lon BETWEEN $3 AND $4
  AND 2.0 * $7 * asin(least(1.0, sqrt(
        pow(sin(radians(lat - $5) / 2.0), 2)
      + cos(radians($5)) * cos(radians(lat))
      * pow(sin(radians(lon - $6) / 2.0), 2)
  ))) <= $8
ORDER BY location_id
"#;

const LOCATE_BBOX_SQL: &str = r#"
SELECT location_id
FROM geocoded_locations
WHERE lat BETWEEN $1 AND $2
  AND lon BETWEEN $3 AND $4
ORDER BY location_id
"#;

#[async_trait]
impl SpatialStore for PgSpatialStore {
    async fn locate(&self, origin: GeoPoint, radius_miles: f64) -> Result<CandidateSet> {
        let start = Instant::now();
        let bbox = BoundingBox::around(origin, radius_miles);

        let records: Vec<LocationRecord> = sqlx::query_as(LOCATE_SQL)
            .bind(bbox.lat_min)
            .bind(bbox.lat_max)
            .bind(bbox.lon_min)
            .bind(bbox.lon_max)
            .bind(origin.lat)
            .bind(origin.lon)
            .bind(EARTH_RADIUS_MILES)
            .bind(radius_miles)
            .fetch_all(&self.pool)
            .await?;

        let set = CandidateSet::from_records(records);
        debug!(
            subsystem = "db",
            component = "spatial",
            op = "locate",
            candidate_count = set.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Located candidates within radius"
        );
        Ok(set)
    }

    async fn locate_bbox(&self, bbox: BoundingBox) -> Result<Vec<i64>> {
        let rows = sqlx::query(LOCATE_BBOX_SQL)
            .bind(bbox.lat_min)
            .bind(bbox.lat_max)
            .bind(bbox.lon_min)
            .bind(bbox.lon_max)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<i64, _>("location_id"))
            .collect())
    }
}
