use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::debug;

use super::GroundTruthIndex;
use crate::error::{Result, RoadGraphError};

/// Bounded LRU cache of ground-truth indices keyed by source tile.
///
/// Tiles whose graph is empty are cached as `None` so they are not rebuilt
/// on every draw.
pub struct GroundTruthCache<K: Hash + Eq> {
    inner: Mutex<LruCache<K, Option<Arc<GroundTruthIndex>>>>,
}

impl<K: Hash + Eq + Clone> GroundTruthCache<K> {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            RoadGraphError::InvalidConfig("cache_capacity must be > 0".to_string())
        })?;
        Ok(Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Return the cached index for `key`, building it with `build` on a miss.
    ///
    /// The lock is not held while building; two threads missing on the same
    /// key may both build, and the last insert wins.
    pub fn get_or_build<F>(&self, key: &K, build: F) -> Result<Option<Arc<GroundTruthIndex>>>
    where
        F: FnOnce() -> Result<Option<GroundTruthIndex>>,
    {
        if let Some(hit) = self.lock().get(key) {
            return Ok(hit.clone());
        }

        let built = build()?.map(Arc::new);
        let mut cache = self.lock();
        if let Some((_, evicted)) = cache.push(key.clone(), built.clone()) {
            debug!(has_graph = evicted.is_some(), "evicted ground-truth index");
        }
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, Option<Arc<GroundTruthIndex>>>> {
        // a poisoned lock only means a builder panicked; the map itself is intact
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
