//! Address geocoding: providers, mocks, and the caching resolver.

pub mod mock;
pub mod provider;
pub mod resolver;

pub use mock::{MemoryGeocodeCache, MockGeocodeProvider};
pub use provider::CensusGeocoder;
pub use resolver::GeocodeResolver;
