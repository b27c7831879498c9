//! Worker result caching.
//!
//! Components that opt in with `run_from_cache` may have a pass serve their
//! outputs from a previous invocation instead of running the worker again.
//! Keys are scoped by node identity, component name, and a canonical
//! fingerprint of the authored controls plus resolved inputs, so two nodes
//! of the same component never share an entry.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::component::OutputMap;
use crate::error::Result;
use crate::node::{NodeId, WorkerInputs, WorkerNode};

/// Cache key for one node invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    node: NodeId,
    component: String,
    fingerprint: String,
}

impl CacheKey {
    /// Compute the key for a node about to run.
    ///
    /// The fingerprint serializes controls and inputs through `BTreeMap`
    /// views so key order is canonical regardless of how the maps were
    /// populated.
    pub fn compute(node: &WorkerNode, inputs: &WorkerInputs) -> Result<Self> {
        #[derive(Serialize)]
        struct Fingerprint<'a> {
            controls: &'a BTreeMap<String, Value>,
            inputs: BTreeMap<&'a String, &'a Vec<Value>>,
        }

        let fingerprint = serde_json::to_string(&Fingerprint {
            controls: node.data(),
            inputs: inputs.as_map().iter().collect(),
        })?;
        Ok(Self {
            node: node.id().to_string(),
            component: node.component().to_string(),
            fingerprint,
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }
}

/// Counters reported by caches that track their traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Stores worker outputs between invocations.
///
/// `get` and `put` are synchronous and must be cheap; the engine calls them
/// on the scheduling path. Lookups and stores for one key are atomic with
/// respect to each other.
pub trait WorkerCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<OutputMap>;
    fn put(&self, key: CacheKey, outputs: OutputMap);
}

/// In-memory cache shared by every pass run on one engine.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, OutputMap>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl WorkerCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<OutputMap> {
        let entry = self.entries.lock().unwrap().get(key).cloned();
        match entry {
            Some(outputs) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(outputs)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: CacheKey, outputs: OutputMap) {
        self.entries.lock().unwrap().insert(key, outputs);
    }
}

/// Cache that stores nothing. Every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl WorkerCache for NullCache {
    fn get(&self, _key: &CacheKey) -> Option<OutputMap> {
        None
    }

    fn put(&self, _key: CacheKey, _outputs: OutputMap) {}
}
