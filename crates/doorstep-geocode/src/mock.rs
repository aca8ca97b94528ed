//! Mock geocoding backends for deterministic testing.
//!
//! [`MockGeocodeProvider`] answers from a fixture table and records every
//! call, so tests can assert both the result and how often the provider was
//! consulted. [`MemoryGeocodeCache`] is an in-process cache with the same
//! failure knobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use doorstep_core::{Error, GeoPoint, GeocodeCache, GeocodeProvider, Result};

/// Mock provider answering from fixtures.
#[derive(Clone, Default)]
pub struct MockGeocodeProvider {
    fixtures: HashMap<String, GeoPoint>,
    fail_with: Option<String>,
    call_log: Arc<Mutex<Vec<String>>>,
}

impl MockGeocodeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture: this address resolves to this point.
    pub fn with_fixture(mut self, address: &str, point: GeoPoint) -> Self {
        self.fixtures.insert(address.to_string(), point);
        self
    }

    /// Make every call fail with a transport error.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Addresses this provider has been asked about, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl GeocodeProvider for MockGeocodeProvider {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        self.call_log
            .lock()
            .expect("call log poisoned")
            .push(address.to_string());
        if let Some(message) = &self.fail_with {
            return Err(Error::Geocode(message.clone()));
        }
        Ok(self.fixtures.get(address).copied())
    }
}

/// In-memory geocode cache.
#[derive(Clone, Default)]
pub struct MemoryGeocodeCache {
    entries: Arc<Mutex<HashMap<String, GeoPoint>>>,
    fail_writes: bool,
}

impl MemoryGeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` fail, leaving reads intact.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Number of cached addresses.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GeocodeCache for MemoryGeocodeCache {
    async fn get(&self, address: &str) -> Result<Option<GeoPoint>> {
        Ok(self
            .entries
            .lock()
            .expect("cache poisoned")
            .get(address)
            .copied())
    }

    async fn put(&self, address: &str, point: GeoPoint) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Internal("cache write rejected".to_string()));
        }
        self.entries
            .lock()
            .expect("cache poisoned")
            .insert(address.to_string(), point);
        Ok(())
    }
}
