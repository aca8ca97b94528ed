//! Caching address resolver.
//!
//! Resolution order: cache, then provider, then cache write-back. Only
//! successful resolutions are cached. A failed cache write degrades to a
//! warning; the caller still gets the coordinate.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use doorstep_core::{Error, GeoPoint, GeocodeCache, GeocodeProvider, Result};

/// Resolves street addresses to coordinates through a persistent cache.
pub struct GeocodeResolver {
    provider: Arc<dyn GeocodeProvider>,
    cache: Arc<dyn GeocodeCache>,
}

impl GeocodeResolver {
    pub fn new(provider: Arc<dyn GeocodeProvider>, cache: Arc<dyn GeocodeCache>) -> Self {
        Self { provider, cache }
    }

    /// Resolve `address` to a coordinate.
    ///
    /// The cache is keyed by the exact string, with no normalization.
    /// Callers trim user input before resolving.
    ///
    /// Returns `Error::Geocode` when the provider finds no match. No-match
    /// and transport failures are never written to the cache, so a later
    /// call retries the provider.
    pub async fn resolve(&self, address: &str) -> Result<GeoPoint> {
        if address.trim().is_empty() {
            return Err(Error::InvalidInput("address must not be empty".to_string()));
        }

        let start = Instant::now();
        if let Some(point) = self.cache.get(address).await? {
            debug!(
                subsystem = "geocode",
                component = "resolver",
                op = "resolve",
                source = "cache",
                duration_ms = start.elapsed().as_millis() as u64,
                "Address resolved"
            );
            return Ok(point);
        }

        let point = self
            .provider
            .geocode(address)
            .await?
            .ok_or_else(|| Error::Geocode(format!("no match for address: {address}")))?;

        if let Err(e) = self.cache.put(address, point).await {
            warn!(
                subsystem = "geocode",
                component = "resolver",
                op = "resolve",
                error = %e,
                "Cache write failed, continuing with provider result"
            );
        }

        debug!(
            subsystem = "geocode",
            component = "resolver",
            op = "resolve",
            source = "provider",
            duration_ms = start.elapsed().as_millis() as u64,
            "Address resolved"
        );
        Ok(point)
    }
}
