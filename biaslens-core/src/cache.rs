//! Memoization of generated recommendations keyed by `(evaluation id, mode)`.
//!
//! Findings are written exactly once, when an evaluation completes, so each
//! entry stays valid for the evaluation's whole post-completion lifetime.
//! [`RecommendationCache::invalidate`] runs on that write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Recommendation, RecommendationMode};

/// Aggregate cache performance metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    /// Compute the hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn accumulate(&mut self, other: &CacheMetrics) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.invalidations += other.invalidations;
    }
}

/// Coarse description of how the cache is being used.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    /// Nothing cached yet.
    Cold,
    /// Entries stored but no hits yet.
    Warm { entries: usize },
    /// Entries actively being hit.
    Hot { entries: usize, hit_rate: f64 },
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheState::Cold => write!(f, "Cold"),
            CacheState::Warm { entries } => write!(f, "Warm ({entries} entries cached)"),
            CacheState::Hot { entries, hit_rate } => {
                write!(
                    f,
                    "Hot ({} entries, {:.0}% hit rate)",
                    entries,
                    hit_rate * 100.0
                )
            }
        }
    }
}

type Key = (Uuid, RecommendationMode);

#[derive(Default)]
struct Inner {
    entries: HashMap<Key, Arc<Vec<Recommendation>>>,
    /// Bumped on every invalidation of an id.
    generations: HashMap<Uuid, u64>,
    metrics: CacheMetrics,
}

impl Inner {
    fn generation(&self, id: Uuid) -> u64 {
        self.generations.get(&id).copied().unwrap_or(0)
    }
}

/// Thread-safe recommendation memo.
#[derive(Default)]
pub struct RecommendationCache {
    inner: Mutex<Inner>,
}

impl RecommendationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Entries are plain values; a panicked writer leaves nothing half-built.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached list, recording a hit or miss.
    pub fn get(&self, id: Uuid, mode: RecommendationMode) -> Option<Arc<Vec<Recommendation>>> {
        let mut inner = self.lock();
        let found = inner.entries.get(&(id, mode)).cloned();
        if found.is_some() {
            inner.metrics.hits += 1;
        } else {
            inner.metrics.misses += 1;
        }
        found
    }

    pub fn insert(
        &self,
        id: Uuid,
        mode: RecommendationMode,
        recommendations: Vec<Recommendation>,
    ) -> Arc<Vec<Recommendation>> {
        let shared = Arc::new(recommendations);
        self.lock().entries.insert((id, mode), Arc::clone(&shared));
        shared
    }

    /// Return the cached list or compute, store and return a fresh one.
    ///
    /// `compute` runs without the lock held. Its result is returned but not
    /// cached if it failed or if `id` was invalidated while it ran.
    pub fn get_or_try_insert<E>(
        &self,
        id: Uuid,
        mode: RecommendationMode,
        compute: impl FnOnce() -> Result<Vec<Recommendation>, E>,
    ) -> Result<Arc<Vec<Recommendation>>, E> {
        let generation = {
            let mut inner = self.lock();
            if let Some(hit) = inner.entries.get(&(id, mode)).cloned() {
                inner.metrics.hits += 1;
                return Ok(hit);
            }
            inner.metrics.misses += 1;
            inner.generation(id)
        };

        let fresh = Arc::new(compute()?);
        let mut inner = self.lock();
        if inner.generation(id) == generation {
            inner.entries.insert((id, mode), Arc::clone(&fresh));
        } else {
            tracing::debug!(evaluation_id = %id, "Discarding recommendations computed before invalidation");
        }
        Ok(fresh)
    }

    /// Drop every mode cached for `id`, including lists still being computed.
    pub fn invalidate(&self, id: Uuid) {
        let mut inner = self.lock();
        *inner.generations.entry(id).or_insert(0) += 1;
        let before = inner.entries.len();
        inner.entries.retain(|(key_id, _), _| *key_id != id);
        if inner.entries.len() != before {
            inner.metrics.invalidations += 1;
            tracing::debug!(evaluation_id = %id, "Recommendation cache invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.lock().metrics
    }

    pub fn state(&self) -> CacheState {
        let inner = self.lock();
        let entries = inner.entries.len();
        if entries == 0 {
            CacheState::Cold
        } else if inner.metrics.hits == 0 {
            CacheState::Warm { entries }
        } else {
            CacheState::Hot {
                entries,
                hit_rate: inner.metrics.hit_rate(),
            }
        }
    }
}
