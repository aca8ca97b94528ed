//! End-to-end retrieval: geocode, locate, cache, fetch, merge, order.
//!
//! The orchestrator owns the cache-degradation policy: a failed cache read
//! logs a warning and treats every candidate as missing, and a failed
//! refresh logs a warning after records are already in hand. Neither failure
//! mode fails the retrieval. Geocoding, candidate location, and registry
//! fetch failures do.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doorstep_core::{
    CacheReadOutcome, Config, Error, GeolocatedRecord, RecordOrdering, RegistryFetcher,
    Result, ResultCache, Retrieval, RetrievalRequest, SpatialStore,
};
use doorstep_geocode::GeocodeResolver;

/// Coordinates the full retrieval pipeline.
pub struct RetrievalOrchestrator {
    resolver: GeocodeResolver,
    spatial: Arc<dyn SpatialStore>,
    cache: Arc<dyn ResultCache>,
    fetcher: Arc<dyn RegistryFetcher>,
    config: Config,
}

impl RetrievalOrchestrator {
    pub fn new(
        resolver: GeocodeResolver,
        spatial: Arc<dyn SpatialStore>,
        cache: Arc<dyn ResultCache>,
        fetcher: Arc<dyn RegistryFetcher>,
        config: Config,
    ) -> Self {
        Self {
            resolver,
            spatial,
            cache,
            fetcher,
            config,
        }
    }

    fn validate(&self, request: &RetrievalRequest) -> Result<()> {
        if !(request.radius_miles.is_finite() && request.radius_miles > 0.0) {
            return Err(Error::InvalidInput(format!(
                "radius must be a positive number of miles, got {}",
                request.radius_miles
            )));
        }
        if !self.config.is_allowed_scope(&request.scope) {
            return Err(Error::InvalidInput(format!(
                "unknown scope: {}",
                request.scope
            )));
        }
        if !self.config.is_allowed_category(&request.category) {
            return Err(Error::InvalidInput(format!(
                "unknown category: {}",
                request.category
            )));
        }
        Ok(())
    }

    /// Run a retrieval: records near the request address, ordered as asked.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Retrieval> {
        self.validate(request)?;

        let request_id = Uuid::now_v7();
        let start = Instant::now();

        // User-facing input is trimmed here so the geocode cache sees one
        // spelling per address.
        let origin = self.resolver.resolve(request.address.trim()).await?;
        debug!(
            request_id = %request_id,
            subsystem = "engine",
            op = "resolve",
            duration_ms = start.elapsed().as_millis() as u64,
            "Origin resolved"
        );

        let candidates = self.spatial.locate(origin, request.radius_miles).await?;
        debug!(
            request_id = %request_id,
            subsystem = "engine",
            op = "locate",
            candidate_count = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidates located"
        );

        if candidates.is_empty() {
            info!(
                request_id = %request_id,
                subsystem = "engine",
                op = "retrieve",
                scope = %request.scope,
                result_count = 0usize,
                duration_ms = start.elapsed().as_millis() as u64,
                "No locations inside radius"
            );
            return Ok(Retrieval {
                origin,
                records: Vec::new(),
                candidate_count: 0,
                cache_hits: 0,
                fetched: 0,
            });
        }

        let ids = candidates.ids();
        let ttl = self.config.cache_ttl();

        // A broken cache degrades to a full fetch, never a failed request.
        let outcome = match self
            .cache
            .read(&request.scope, &ids, &request.category, ttl)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    subsystem = "engine",
                    op = "cache_read",
                    error = %e,
                    "Cache read failed, fetching everything"
                );
                CacheReadOutcome {
                    fresh: Vec::new(),
                    missing: ids.clone(),
                }
            }
        };
        let cache_hits = outcome.fresh.len();

        let mut records = outcome.fresh;
        let mut fetched = 0;
        if !outcome.missing.is_empty() {
            let source = self
                .fetcher
                .fetch(&request.scope, &outcome.missing, &request.category)
                .await?;
            fetched = source.len();

            let now = Utc::now();
            let rows: Vec<_> = source
                .into_iter()
                .map(|r| r.into_cached(&request.scope, now))
                .collect();

            if let Err(e) = self.cache.refresh(&request.scope, &outcome.missing, &rows).await {
                warn!(
                    request_id = %request_id,
                    subsystem = "engine",
                    op = "cache_refresh",
                    error = %e,
                    "Cache refresh failed, serving fetched records anyway"
                );
            }
            records.extend(rows);
        }

        // Attach each record's location coordinate; every location id came
        // from the candidate set, so the lookup only misses if the stores
        // disagree, and such rows are dropped.
        let mut located: Vec<GeolocatedRecord> = Vec::with_capacity(records.len());
        for record in records {
            match candidates.coordinate_of(record.location_id) {
                Some(point) => located.push(GeolocatedRecord {
                    record,
                    lat: point.lat,
                    lon: point.lon,
                }),
                None => warn!(
                    request_id = %request_id,
                    subsystem = "engine",
                    op = "attach",
                    location_id = record.location_id,
                    "Record references a location outside the candidate set"
                ),
            }
        }

        let order = match request.ordering {
            RecordOrdering::Street => doorstep_core::order_by_street(&located),
            RecordOrdering::Tour => doorstep_core::order_by_tour(&located),
        };
        let records: Vec<GeolocatedRecord> = {
            let mut slots: Vec<Option<GeolocatedRecord>> =
                located.into_iter().map(Some).collect();
            order
                .into_iter()
                .filter_map(|i| slots.get_mut(i).and_then(Option::take))
                .collect()
        };

        info!(
            request_id = %request_id,
            subsystem = "engine",
            op = "retrieve",
            scope = %request.scope,
            category = %request.category,
            candidate_count = candidates.len(),
            cache_hits,
            fetched,
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );

        Ok(Retrieval {
            origin,
            records,
            candidate_count: candidates.len(),
            cache_hits,
            fetched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryRegistry, MemoryResultCache, MemorySpatialStore};
    use doorstep_core::{GeoPoint, LocationRecord, SourceRecord};
    use doorstep_geocode::{MemoryGeocodeCache, MockGeocodeProvider};

    const ADDRESS: &str = "12 Main St, Deland, FL";

    fn origin() -> GeoPoint {
        GeoPoint {
            lat: 29.0283,
            lon: -81.3031,
        }
    }

    fn location(id: i64, lat: f64, lon: f64) -> LocationRecord {
        LocationRecord {
            location_id: id,
            lat,
            lon,
            full_address: format!("{id} Grand Ave"),
            scope: "VOL".to_string(),
        }
    }

    fn source(record_id: i64, location_id: i64, category: &str) -> SourceRecord {
        SourceRecord {
            record_id,
            location_id,
            display_name: Some(format!("Resident {record_id}")),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            birth_date: None,
            category: Some(category.to_string()),
            address: Some(format!("{location_id} Grand Ave")),
        }
    }

    fn orchestrator(
        spatial: MemorySpatialStore,
        cache: MemoryResultCache,
        registry: MemoryRegistry,
    ) -> RetrievalOrchestrator {
        let provider = MockGeocodeProvider::new().with_fixture(ADDRESS, origin());
        let resolver = GeocodeResolver::new(
            Arc::new(provider),
            Arc::new(MemoryGeocodeCache::new()),
        );
        RetrievalOrchestrator::new(
            resolver,
            Arc::new(spatial),
            Arc::new(cache),
            Arc::new(registry),
            Config::default(),
        )
    }

    fn request() -> RetrievalRequest {
        RetrievalRequest::new(ADDRESS, 0.1, "VOL")
    }

    #[tokio::test]
    async fn cold_cache_fetches_then_serves_from_cache() {
        let spatial = MemorySpatialStore::new(vec![
            location(10, 29.0284, -81.3030),
            location(11, 29.0280, -81.3035),
        ]);
        let cache = MemoryResultCache::new();
        let registry = MemoryRegistry::new(vec![
            source(100, 10, "DEM"),
            source(110, 11, "REP"),
        ]);

        let orch = orchestrator(spatial, cache.clone(), registry.clone());

        let first = orch.retrieve(&request()).await.unwrap();
        assert_eq!(first.candidate_count, 2);
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first.fetched, 2);
        assert_eq!(first.records.len(), 2);

        let second = orch.retrieve(&request()).await.unwrap();
        assert_eq!(second.cache_hits, 2);
        assert_eq!(second.fetched, 0);
        assert_eq!(registry.fetch_count(), 1);
    }

    #[tokio::test]
    async fn empty_candidate_set_short_circuits() {
        let orch = orchestrator(
            MemorySpatialStore::new(Vec::new()),
            MemoryResultCache::new(),
            MemoryRegistry::new(Vec::new()),
        );

        let result = orch.retrieve(&request()).await.unwrap();
        assert_eq!(result.candidate_count, 0);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected_before_geocoding() {
        let orch = orchestrator(
            MemorySpatialStore::new(Vec::new()),
            MemoryResultCache::new(),
            MemoryRegistry::new(Vec::new()),
        );

        let mut bad = request();
        bad.radius_miles = 0.0;
        assert!(matches!(
            orch.retrieve(&bad).await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        let mut bad = request();
        bad.scope = "XXX".to_string();
        assert!(matches!(
            orch.retrieve(&bad).await.unwrap_err(),
            Error::InvalidInput(_)
        ));

        let mut bad = request();
        bad.category = "GRE".to_string();
        assert!(matches!(
            orch.retrieve(&bad).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_trimmed_before_geocoding() {
        let spatial = MemorySpatialStore::new(vec![location(10, 29.0284, -81.3030)]);
        let registry = MemoryRegistry::new(vec![source(100, 10, "DEM")]);
        let orch = orchestrator(spatial, MemoryResultCache::new(), registry);

        // The mock only knows the trimmed spelling.
        let req = RetrievalRequest::new(format!("  {ADDRESS}  "), 0.1, "VOL");
        let result = orch.retrieve(&req).await.unwrap();
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn category_with_no_matching_records_yields_empty_result() {
        let spatial = MemorySpatialStore::new(vec![location(10, 29.0284, -81.3030)]);
        let registry = MemoryRegistry::new(vec![source(100, 10, "DEM")]);

        let orch = orchestrator(spatial, MemoryResultCache::new(), registry);
        let req = request().with_category("NPA");
        let result = orch.retrieve(&req).await.unwrap();
        assert_eq!(result.candidate_count, 1);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn cache_read_failure_degrades_to_full_fetch() {
        let spatial = MemorySpatialStore::new(vec![location(10, 29.0284, -81.3030)]);
        let cache = MemoryResultCache::new().with_failing_reads();
        let registry = MemoryRegistry::new(vec![source(100, 10, "DEM")]);

        let orch = orchestrator(spatial, cache, registry);
        let result = orch.retrieve(&request()).await.unwrap();
        assert_eq!(result.cache_hits, 0);
        assert_eq!(result.fetched, 1);
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn cache_refresh_failure_still_returns_fetched_records() {
        let spatial = MemorySpatialStore::new(vec![location(10, 29.0284, -81.3030)]);
        let cache = MemoryResultCache::new().with_failing_writes();
        let registry = MemoryRegistry::new(vec![source(100, 10, "DEM")]);

        let orch = orchestrator(spatial, cache, registry);
        let result = orch.retrieve(&request()).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.fetched, 1);
    }

    #[tokio::test]
    async fn street_ordering_sorts_by_street_then_house_number() {
        let spatial = MemorySpatialStore::new(vec![
            location(10, 29.0284, -81.3030),
            location(11, 29.0280, -81.3035),
            location(12, 29.0285, -81.3028),
        ]);
        let mut s1 = source(100, 10, "DEM");
        s1.address = Some("120 Grand Ave".to_string());
        let mut s2 = source(110, 11, "DEM");
        s2.address = Some("7 Grand Ave".to_string());
        let mut s3 = source(120, 12, "DEM");
        s3.address = Some("5 Apple Rd".to_string());
        let registry = MemoryRegistry::new(vec![s1, s2, s3]);

        let orch = orchestrator(spatial, MemoryResultCache::new(), registry);
        let result = orch.retrieve(&request()).await.unwrap();
        let streets: Vec<_> = result
            .records
            .iter()
            .map(|r| r.record.address.clone().unwrap())
            .collect();
        assert_eq!(streets, vec!["5 Apple Rd", "7 Grand Ave", "120 Grand Ave"]);
    }

    #[tokio::test]
    async fn tour_ordering_returns_every_record_once() {
        let spatial = MemorySpatialStore::new(vec![
            location(10, 29.0284, -81.3030),
            location(11, 29.0280, -81.3035),
            location(12, 29.0285, -81.3028),
        ]);
        let registry = MemoryRegistry::new(vec![
            source(100, 10, "DEM"),
            source(110, 11, "REP"),
            source(120, 12, "NPA"),
        ]);

        let orch = orchestrator(spatial, MemoryResultCache::new(), registry);
        let req = request().with_ordering(RecordOrdering::Tour);
        let result = orch.retrieve(&req).await.unwrap();

        let mut ids: Vec<i64> = result.records.iter().map(|r| r.record.record_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 110, 120]);
    }
}
