//! Centralized default constants for the doorstep workspace.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. When adding new constants, place them in the appropriate section
//! and document the rationale for the chosen value.

// =============================================================================
// FETCHING
// =============================================================================

/// Default number of location ids per outgoing registry query.
///
/// Keeps the bound id list (and the statement itself) within a size the
/// remote store handles comfortably.
pub const FETCH_CHUNK_SIZE: usize = 200;

/// Maximum number of chunk queries in flight at once.
pub const FETCH_CONCURRENCY: usize = 4;

// =============================================================================
// CACHING
// =============================================================================

/// Default cache time-to-live in days.
pub const CACHE_TTL_DAYS: i64 = 30;

/// Rows per cache insert statement during a refresh.
pub const CACHE_INSERT_BATCH: usize = 200;

// =============================================================================
// GEODESY
// =============================================================================

/// Miles per degree of latitude (flat-earth bounding-box approximation).
pub const MILES_PER_DEGREE: f64 = 69.0;

/// Mean earth radius in miles, for great-circle distance.
pub const EARTH_RADIUS_MILES: f64 = 3958.7613;

/// Lower bound on cos(latitude) when computing the longitude delta of a
/// bounding box. Guards the division near the poles.
pub const COS_LAT_EPSILON: f64 = 1e-6;

// =============================================================================
// GEOCODING
// =============================================================================

/// Default geocoding provider endpoint (US Census one-line-address lookup).
pub const GEOCODER_URL: &str =
    "https://geocoding.geo.census.gov/geocoder/locations/onelineaddress";

/// Benchmark dataset identifier sent with every geocoding request.
pub const GEOCODER_BENCHMARK: &str = "Public_AR_Current";

/// Timeout for a single geocoding request, in seconds.
pub const GEOCODER_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// REGISTRY
// =============================================================================

/// Expiration sentinel marking a registry row as currently active.
/// Rows with any other expiration date are invisible to queries.
pub const ACTIVE_SENTINEL: &str = "2100-12-31";

/// Category filter wildcard matching every category.
pub const CATEGORY_ALL: &str = "ALL";

// =============================================================================
// ALLOW-LISTS
// =============================================================================

/// Default scope (administrative region) allow-list.
pub const ALLOWED_SCOPES: &[&str] = &["ALA", "BRE", "BRO", "VOL", "DAD"];

/// Default category allow-list. `ALL` is the wildcard.
pub const ALLOWED_CATEGORIES: &[&str] = &["ALL", "DEM", "REP", "NPA"];
