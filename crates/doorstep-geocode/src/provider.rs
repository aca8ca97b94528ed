//! Census Bureau geocoding provider.
//!
//! Uses the public one-line-address endpoint. The response carries zero or
//! more address matches; the first one wins. In match coordinates, `x` is
//! longitude and `y` is latitude.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use doorstep_core::defaults::{GEOCODER_BENCHMARK, GEOCODER_TIMEOUT_SECS, GEOCODER_URL};
use doorstep_core::{GeoPoint, GeocodeProvider, Result};

/// Geocoding backend over the Census Bureau locations API.
pub struct CensusGeocoder {
    client: Client,
    base_url: String,
    benchmark: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    result: GeocodeResult,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<AddressMatch>,
}

#[derive(Debug, Deserialize)]
struct AddressMatch {
    coordinates: Coordinates,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    /// Longitude.
    x: f64,
    /// Latitude.
    y: f64,
}

impl CensusGeocoder {
    /// Create a provider against the public Census endpoint.
    pub fn new() -> Self {
        Self::with_config(
            GEOCODER_URL.to_string(),
            GEOCODER_BENCHMARK.to_string(),
            GEOCODER_TIMEOUT_SECS,
        )
    }

    /// Create a provider with custom endpoint, benchmark, and timeout.
    pub fn with_config(base_url: String, benchmark: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            benchmark,
        }
    }
}

impl Default for CensusGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeocodeProvider for CensusGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("address", address),
                ("benchmark", self.benchmark.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: GeocodeResponse = response.json().await?;
        let point = body
            .result
            .address_matches
            .first()
            .map(|m| GeoPoint {
                lat: m.coordinates.y,
                lon: m.coordinates.x,
            });

        debug!(
            subsystem = "geocode",
            component = "census",
            op = "geocode",
            matched = point.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Provider lookup"
        );
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_first_match_coordinates() {
        let body = r#"{
            "result": {
                "addressMatches": [
                    {"coordinates": {"x": -81.3031, "y": 29.0283}},
                    {"coordinates": {"x": 0.0, "y": 0.0}}
                ]
            }
        }"#;
        let parsed: GeocodeResponse = serde_json::from_str(body).unwrap();
        let first = parsed.result.address_matches.first().unwrap();
        assert!((first.coordinates.y - 29.0283).abs() < 1e-9);
        assert!((first.coordinates.x - -81.3031).abs() < 1e-9);
    }

    #[test]
    fn response_with_no_matches_is_empty_not_an_error() {
        let body = r#"{"result": {"addressMatches": []}}"#;
        let parsed: GeocodeResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.result.address_matches.is_empty());

        // The field may be absent entirely.
        let body = r#"{"result": {}}"#;
        let parsed: GeocodeResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.result.address_matches.is_empty());
    }
}
