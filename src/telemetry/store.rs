use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;

use super::Sample;

/// Latest value per key, shared between ingestion threads and consumers.
///
/// Cloning the store yields another handle to the same table. Each `get` and
/// `set` is atomic on its own; there is no consistency across keys, and the
/// last write for a key always wins.
#[derive(Debug, Default, Clone)]
pub struct SampleStore {
    inner: Arc<RwLock<HashMap<String, Arc<Value>>>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest value for `key`, never blocking on anything but the
    /// table lock itself.
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
    }

    pub fn insert(&self, sample: Sample) {
        self.set(sample.key, sample.value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read access to telemetry values by key.
pub trait SampleLookup {
    fn lookup(&self, key: &str) -> Option<Arc<Value>>;
}

impl SampleLookup for SampleStore {
    fn lookup(&self, key: &str) -> Option<Arc<Value>> {
        self.get(key)
    }
}

/// Searches several stores in order, returning the first hit. Keys are
/// expected to be unique across sources.
impl SampleLookup for [SampleStore] {
    fn lookup(&self, key: &str) -> Option<Arc<Value>> {
        self.iter().find_map(|store| store.get(key))
    }
}

impl SampleLookup for Vec<SampleStore> {
    fn lookup(&self, key: &str) -> Option<Arc<Value>> {
        self.as_slice().lookup(key)
    }
}
