//! Batch cache warmer.
//!
//! Warms the result cache for a set of locations ahead of retrievals, so
//! the first interactive request over an area hits a fresh cache instead of
//! paying for the registry fetch. Location ids come from one of four
//! sources: an explicit list, a file, a bounding box, or a radius around a
//! geocoded address.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use doorstep_core::defaults::CATEGORY_ALL;
use doorstep_core::{
    BoundingBox, Config, Error, GeoPoint, RegistryFetcher, Result, ResultCache, SpatialStore,
};
use doorstep_geocode::GeocodeResolver;

/// Where the ids to warm come from.
#[derive(Debug, Clone)]
pub enum IdSource {
    /// Explicit location ids.
    Explicit(Vec<i64>),
    /// A file with one location id per line; blank lines and `#` comments
    /// are skipped.
    File(PathBuf),
    /// Every location inside a bounding box.
    Bbox(BoundingBox),
    /// Every location within a radius of a geocoded address.
    Around { address: String, radius_miles: f64 },
}

/// Warm run options.
#[derive(Debug, Clone)]
pub struct WarmOptions {
    pub scope: String,
    pub category: String,
    /// Skip locations the cache already covers freshly.
    pub respect_ttl: bool,
    /// Resolve the id set and report, but fetch and write nothing.
    pub dry_run: bool,
}

impl WarmOptions {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            category: CATEGORY_ALL.to_string(),
            respect_ttl: true,
            dry_run: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn ignore_ttl(mut self) -> Self {
        self.respect_ttl = false;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// What a warm run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmReport {
    /// Distinct location ids the source produced.
    pub requested: usize,
    /// Ids skipped because the cache already covered them freshly.
    pub skipped_fresh: usize,
    /// Records fetched from the registry store.
    pub fetched: usize,
    /// Records written into the cache.
    pub refreshed: usize,
    pub dry_run: bool,
}

/// Drives warm runs against the same backends retrieval uses.
pub struct CacheWarmer {
    resolver: GeocodeResolver,
    spatial: Arc<dyn SpatialStore>,
    cache: Arc<dyn ResultCache>,
    fetcher: Arc<dyn RegistryFetcher>,
    config: Config,
}

impl CacheWarmer {
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

    async fn gather(&self, source: &IdSource) -> Result<Vec<i64>> {
        let ids = match source {
            IdSource::Explicit(ids) => ids.clone(),
            IdSource::File(path) => parse_id_file(&std::fs::read_to_string(path)?)?,
            IdSource::Bbox(bbox) => self.spatial.locate_bbox(*bbox).await?,
            IdSource::Around {
                address,
                radius_miles,
            } => {
                let origin: GeoPoint = self.resolver.resolve(address.trim()).await?;
                self.spatial.locate(origin, *radius_miles).await?.ids()
            }
        };
        Ok(dedup_ids(ids))
    }

    /// Run one warm pass.
    pub async fn run(&self, source: &IdSource, options: &WarmOptions) -> Result<WarmReport> {
        if !self.config.is_allowed_scope(&options.scope) {
            return Err(Error::InvalidInput(format!(
                "unknown scope: {}",
                options.scope
            )));
        }
        if !self.config.is_allowed_category(&options.category) {
            return Err(Error::InvalidInput(format!(
                "unknown category: {}",
                options.category
            )));
        }

        let ids = self.gather(source).await?;
        let requested = ids.len();

        let targets = if options.respect_ttl && !ids.is_empty() {
            match self
                .cache
                .read(&options.scope, &ids, &options.category, self.config.cache_ttl())
                .await
            {
                Ok(outcome) => outcome.missing,
                Err(e) => {
                    warn!(
                        subsystem = "engine",
                        component = "warmer",
                        op = "cache_read",
                        error = %e,
                        "Cache read failed, warming every id"
                    );
                    ids.clone()
                }
            }
        } else {
            ids.clone()
        };
        let skipped_fresh = requested - targets.len();

        if options.dry_run || targets.is_empty() {
            info!(
                subsystem = "engine",
                component = "warmer",
                op = "warm",
                scope = %options.scope,
                requested,
                skipped_fresh,
                dry_run = options.dry_run,
                "Nothing to warm"
            );
            return Ok(WarmReport {
                requested,
                skipped_fresh,
                fetched: 0,
                refreshed: 0,
                dry_run: options.dry_run,
            });
        }

        let source_rows = self
            .fetcher
            .fetch(&options.scope, &targets, &options.category)
            .await?;
        let fetched = source_rows.len();

        let now = Utc::now();
        let rows: Vec<_> = source_rows
            .into_iter()
            .map(|r| r.into_cached(&options.scope, now))
            .collect();
        // A warm run exists to write the cache, so a refresh failure is
        // fatal here, unlike in retrieval.
        self.cache.refresh(&options.scope, &targets, &rows).await?;

        info!(
            subsystem = "engine",
            component = "warmer",
            op = "warm",
            scope = %options.scope,
            category = %options.category,
            requested,
            skipped_fresh,
            fetched,
            refreshed = rows.len(),
            "Warm pass complete"
        );
        Ok(WarmReport {
            requested,
            skipped_fresh,
            fetched,
            refreshed: rows.len(),
            dry_run: false,
        })
    }
}

fn dedup_ids(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Parse an id file: one id per line, blank lines and `#` comments skipped.
pub fn parse_id_file(content: &str) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = line.parse::<i64>().map_err(|_| {
            Error::InvalidInput(format!("line {}: not a location id: {line}", number + 1))
        })?;
        ids.push(id);
    }
    Ok(ids)
}
