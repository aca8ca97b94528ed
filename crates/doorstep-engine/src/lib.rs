//! Retrieval orchestration and cache warming.
//!
//! [`RetrievalOrchestrator`] runs the interactive pipeline: geocode the
//! request address, locate candidate locations inside the radius, serve
//! fresh cached records, fetch the rest from the registry store, and order
//! the merged result. [`CacheWarmer`] runs the same fetch-and-refresh tail
//! in bulk, ahead of time.

pub mod orchestrator;
pub mod testing;
pub mod warm;

pub use orchestrator::RetrievalOrchestrator;
pub use warm::{CacheWarmer, IdSource, WarmOptions, WarmReport};
