//! Process configuration, assembled once at startup.
//!
//! The whole workspace reads environment state exactly once, here. The
//! resulting value is passed down through constructors; nothing re-reads
//! globals mid-operation.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DOORSTEP_GEO_DB_URL` | — (required) | Spatial/cache store connection URL |
//! | `DOORSTEP_REGISTRY_DB_URL` | — (required) | Remote registry store connection URL |
//! | `DOORSTEP_CACHE_TTL_DAYS` | `30` | Cache freshness window |
//! | `DOORSTEP_CHUNK_SIZE` | `200` | Location ids per registry query |
//! | `DOORSTEP_FETCH_CONCURRENCY` | `4` | Chunk queries in flight at once |
//! | `DOORSTEP_JOIN_STRATEGY` | `registry-driven` | Registry join shape |
//! | `DOORSTEP_GEOCODER_URL` | Census endpoint | Geocoding provider URL |
//! | `DOORSTEP_GEOCODER_BENCHMARK` | `Public_AR_Current` | Provider benchmark id |
//! | `DOORSTEP_GEOCODER_TIMEOUT_SECS` | `10` | Provider request timeout |
//! | `DOORSTEP_SCOPES` | `ALA,BRE,BRO,VOL,DAD` | Scope allow-list |
//! | `DOORSTEP_CATEGORIES` | `ALL,DEM,REP,NPA` | Category allow-list |

use chrono::Duration;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::JoinStrategy;

/// Complete runtime configuration for the retrieval core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection URL for the spatial store (also holds the result cache and
    /// geocode cache tables).
    pub geo_database_url: String,
    /// Connection URL for the remote registry store.
    pub registry_database_url: String,
    /// Cache freshness window in days.
    pub cache_ttl_days: i64,
    /// Location ids per outgoing registry query.
    pub chunk_size: usize,
    /// Maximum concurrent chunk queries.
    pub fetch_concurrency: usize,
    /// Registry join strategy, chosen once here.
    pub join_strategy: JoinStrategy,
    /// Geocoding provider endpoint.
    pub geocoder_url: String,
    /// Benchmark dataset identifier sent with every geocode request.
    pub geocoder_benchmark: String,
    /// Geocoding request timeout in seconds.
    pub geocoder_timeout_secs: u64,
    /// Scope codes accepted by validation, uppercased.
    pub allowed_scopes: Vec<String>,
    /// Category codes accepted by validation, uppercased.
    pub allowed_categories: Vec<String>,
}

impl Config {
    /// Assemble configuration from the environment. Fails when either store
    /// URL is missing or a value does not parse.
    pub fn from_env() -> Result<Self> {
        let geo_database_url = require_env("DOORSTEP_GEO_DB_URL")?;
        let registry_database_url = require_env("DOORSTEP_REGISTRY_DB_URL")?;

        Ok(Self {
            geo_database_url,
            registry_database_url,
            cache_ttl_days: parse_env("DOORSTEP_CACHE_TTL_DAYS", defaults::CACHE_TTL_DAYS)?,
            chunk_size: parse_env("DOORSTEP_CHUNK_SIZE", defaults::FETCH_CHUNK_SIZE)?,
            fetch_concurrency: parse_env(
                "DOORSTEP_FETCH_CONCURRENCY",
                defaults::FETCH_CONCURRENCY,
            )?,
            join_strategy: match std::env::var("DOORSTEP_JOIN_STRATEGY") {
                Ok(v) => v.parse()?,
                Err(_) => JoinStrategy::default(),
            },
            geocoder_url: std::env::var("DOORSTEP_GEOCODER_URL")
                .unwrap_or_else(|_| defaults::GEOCODER_URL.to_string()),
            geocoder_benchmark: std::env::var("DOORSTEP_GEOCODER_BENCHMARK")
                .unwrap_or_else(|_| defaults::GEOCODER_BENCHMARK.to_string()),
            geocoder_timeout_secs: parse_env(
                "DOORSTEP_GEOCODER_TIMEOUT_SECS",
                defaults::GEOCODER_TIMEOUT_SECS,
            )?,
            allowed_scopes: list_env("DOORSTEP_SCOPES", defaults::ALLOWED_SCOPES),
            allowed_categories: list_env("DOORSTEP_CATEGORIES", defaults::ALLOWED_CATEGORIES),
        })
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::days(self.cache_ttl_days)
    }

    pub fn is_allowed_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.iter().any(|s| s == scope)
    }

    pub fn is_allowed_category(&self, category: &str) -> bool {
        self.allowed_categories.iter().any(|c| c == category)
    }
}

impl Default for Config {
    /// In-memory default for tests and embedding callers that supply their
    /// own pools. Store URLs are empty and must be overridden before use.
    fn default() -> Self {
        Self {
            geo_database_url: String::new(),
            registry_database_url: String::new(),
            cache_ttl_days: defaults::CACHE_TTL_DAYS,
            chunk_size: defaults::FETCH_CHUNK_SIZE,
            fetch_concurrency: defaults::FETCH_CONCURRENCY,
            join_strategy: JoinStrategy::default(),
            geocoder_url: defaults::GEOCODER_URL.to_string(),
            geocoder_benchmark: defaults::GEOCODER_BENCHMARK.to_string(),
            geocoder_timeout_secs: defaults::GEOCODER_TIMEOUT_SECS,
            allowed_scopes: defaults::ALLOWED_SCOPES.iter().map(|s| s.to_string()).collect(),
            allowed_categories: defaults::ALLOWED_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::Config(format!("missing {name}")))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("invalid {name}: {v}"))),
        Err(_) => Ok(default),
    }
}

fn list_env(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_carries_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.join_strategy, JoinStrategy::RegistryDriven);
        assert_eq!(config.cache_ttl(), Duration::days(30));
    }

    #[test]
    fn allow_list_checks_are_exact_uppercase() {
        let config = Config::default();
        assert!(config.is_allowed_scope("VOL"));
        assert!(!config.is_allowed_scope("vol"));
        assert!(!config.is_allowed_scope("XXX"));
        assert!(config.is_allowed_category("ALL"));
        assert!(config.is_allowed_category("NPA"));
        assert!(!config.is_allowed_category("GRE"));
    }
}
