//! Shared data model for the retrieval/cache core.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::CATEGORY_ALL;
use crate::error::Error;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One row of the spatial store's geocoded-location relation. Read-only to
/// this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocationRecord {
    pub location_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub full_address: String,
    pub scope: String,
}

impl LocationRecord {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Ordered, location-id-deduplicated set of candidate locations for one
/// query. Each entry keeps its coordinate for route ordering and display.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    records: Vec<LocationRecord>,
    by_id: HashMap<i64, usize>,
}

impl CandidateSet {
    /// Build a candidate set, dropping duplicate location ids while
    /// preserving first-seen order.
    pub fn from_records(records: Vec<LocationRecord>) -> Self {
        let mut deduped = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            if !by_id.contains_key(&record.location_id) {
                by_id.insert(record.location_id, deduped.len());
                deduped.push(record);
            }
        }
        Self {
            records: deduped,
            by_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Candidate location ids in set order.
    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.location_id).collect()
    }

    pub fn coordinate_of(&self, location_id: i64) -> Option<GeoPoint> {
        self.by_id
            .get(&location_id)
            .map(|&i| self.records[i].point())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationRecord> {
        self.records.iter()
    }
}

/// A denormalized registry record as cached locally.
///
/// Primary key is (scope, location_id, record_id); rows are created or
/// overwritten whole by a cache refresh, never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedRecord {
    pub scope: String,
    pub location_id: i64,
    pub record_id: i64,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub category: Option<String>,
    /// Multi-line address: street line, then optional secondary line.
    pub address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CachedRecord {
    /// Whether this row counts as fresh under `ttl` at time `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at <= ttl
    }
}

/// The remote registry store's projection of an active registry row joined
/// to its contact/demographic attributes and address. One row per
/// (record_id, location_id) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceRecord {
    pub record_id: i64,
    pub location_id: i64,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub address: Option<String>,
}

impl SourceRecord {
    /// Convert to the cached representation under `scope` with the given
    /// refresh timestamp.
    pub fn into_cached(self, scope: &str, updated_at: DateTime<Utc>) -> CachedRecord {
        CachedRecord {
            scope: scope.to_string(),
            location_id: self.location_id,
            record_id: self.record_id,
            display_name: self.display_name,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            birth_date: self.birth_date,
            category: self.category,
            address: self.address,
            updated_at,
        }
    }
}

/// A cached record with its location's coordinate attached, ready for route
/// ordering and map display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocatedRecord {
    pub record: CachedRecord,
    pub lat: f64,
    pub lon: f64,
}

impl GeolocatedRecord {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// How the chunk's id list participates in the registry join.
///
/// All variants return the identical row set for identical inputs; they
/// differ only in query-plan shape on large registries. `DerivedTable` and
/// `TwoStep` exist for planner steering and are never the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinStrategy {
    /// `IN` list against the registry's own location foreign key. Fastest
    /// observed; the default.
    #[default]
    RegistryDriven,
    /// `IN` list against the address relation's id, address joined first.
    AddressDriven,
    /// Chunk ids wrapped as an inline derived relation joined first, forcing
    /// join order.
    DerivedTable,
    /// Diagnostic variant: id probe first, then a row fetch keyed by record
    /// id. For comparison and troubleshooting only.
    TwoStep,
}

impl FromStr for JoinStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registry" | "registry-driven" => Ok(Self::RegistryDriven),
            "address" | "address-driven" => Ok(Self::AddressDriven),
            "derived" | "derived-table" => Ok(Self::DerivedTable),
            "two-step" | "diagnostic" => Ok(Self::TwoStep),
            other => Err(Error::Config(format!("unknown join strategy: {other}"))),
        }
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryDriven => write!(f, "registry-driven"),
            Self::AddressDriven => write!(f, "address-driven"),
            Self::DerivedTable => write!(f, "derived-table"),
            Self::TwoStep => write!(f, "two-step"),
        }
    }
}

/// Ordering applied to the final record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordOrdering {
    /// Lexicographic street order (house number stripped, then numeric
    /// tie-break).
    #[default]
    Street,
    /// Optimized visiting order (nearest-neighbor + 2-opt).
    Tour,
}

/// One radius-retrieval request.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// Free-text address to geocode.
    pub address: String,
    /// Search radius in miles. Must be > 0.
    pub radius_miles: f64,
    /// Scope (administrative region) code, e.g. a county.
    pub scope: String,
    /// Category filter; `ALL` matches everything.
    pub category: String,
    pub ordering: RecordOrdering,
}

impl RetrievalRequest {
    pub fn new(address: impl Into<String>, radius_miles: f64, scope: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            radius_miles,
            scope: scope.into(),
            category: CATEGORY_ALL.to_string(),
            ordering: RecordOrdering::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_ordering(mut self, ordering: RecordOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

/// The result of one retrieval: ordered geolocated records plus provenance
/// counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    /// Resolved coordinate of the request address.
    pub origin: GeoPoint,
    /// Records in the requested ordering.
    pub records: Vec<GeolocatedRecord>,
    /// Number of candidate locations inside the radius.
    pub candidate_count: usize,
    /// Records served from the fresh cache partition.
    pub cache_hits: usize,
    /// Records fetched from the registry store this request.
    pub fetched: usize,
}
