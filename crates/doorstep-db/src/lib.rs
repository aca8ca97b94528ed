//! PostgreSQL storage layer.
//!
//! Two independent databases back the system:
//!
//! - The **geo store** holds geocoded locations, the address geocode cache,
//!   and the result cache. It is fully owned by this crate, which creates
//!   its schema on demand.
//! - The **registry store** is an external, read-only database holding the
//!   registry, contact, and address relations that fetches join across.
//!
//! Each store gets its own connection pool; see [`pool`] for sizing.

pub mod cache;
pub mod geocode_cache;
pub mod pool;
pub mod registry;
pub mod spatial;

pub use cache::PgResultCache;
pub use geocode_cache::PgGeocodeCache;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig, StorePools};
pub use registry::{chunk_ids, FetchConfig, PgRegistryFetcher};
pub use spatial::PgSpatialStore;
