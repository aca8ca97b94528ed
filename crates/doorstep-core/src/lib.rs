//! # doorstep-core
//!
//! Core types, traits, and abstractions for the doorstep radius-retrieval
//! engine.
//!
//! This crate provides:
//! - The shared data model (locations, candidate sets, cached records)
//! - Repository traits for every external collaborator
//! - Pure geodesy (bounding-box prefilter, haversine distance)
//! - Pure route orderings (nearest-neighbor + 2-opt tour, street order)
//! - The process-wide error taxonomy and configuration

pub mod config;
pub mod defaults;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod route;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::Config;
pub use error::{Error, Result};
pub use geo::{haversine_miles, BoundingBox};
pub use models::{
    CachedRecord, CandidateSet, GeoPoint, GeolocatedRecord, JoinStrategy, LocationRecord,
    RecordOrdering, Retrieval, RetrievalRequest, SourceRecord,
};
pub use route::{order_by_street, order_by_tour, tour_length};
pub use traits::{
    CacheReadOutcome, GeocodeCache, GeocodeProvider, RegistryFetcher, ResultCache, SpatialStore,
};
