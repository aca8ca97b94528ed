//! Pure geodesy: bounding-box prefilter math and great-circle distance.
//!
//! The candidate query runs in two phases. A rectangular bounding box (cheap,
//! indexable range predicate) shrinks the set, then exact great-circle
//! distance removes the box's corner false positives. The box must never
//! exclude a point that is truly within the radius, so the latitude delta
//! uses the fixed miles-per-degree constant and the longitude delta divides
//! by cos(latitude) with a guard against the poles.

use serde::{Deserialize, Serialize};

use crate::defaults::{COS_LAT_EPSILON, EARTH_RADIUS_MILES, MILES_PER_DEGREE};
use crate::models::GeoPoint;

/// Rectangular lat/lon region used as the spatial prefilter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Compute the box containing every point within `radius_miles` of
    /// `origin`, using the flat-earth approximation.
    pub fn around(origin: GeoPoint, radius_miles: f64) -> Self {
        let lat_delta = radius_miles / MILES_PER_DEGREE;
        let cos_lat = origin.lat.to_radians().cos().max(COS_LAT_EPSILON);
        let lon_delta = radius_miles / (cos_lat * MILES_PER_DEGREE);
        Self {
            lat_min: origin.lat - lat_delta,
            lat_max: origin.lat + lat_delta,
            lon_min: origin.lon - lon_delta,
            lon_max: origin.lon + lon_delta,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }
}

/// Great-circle (haversine) distance between two points, in miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}
