//! Time-bounded memoization for discovery results.
//!
//! Discovery walks several endpoints to produce a single answer, so results are
//! memoized per key for a fixed TTL. Each key owns a slot guarded by an async
//! mutex that stays locked while its value is computed: a caller either sees a
//! fresh entry or performs the one refresh every concurrent caller of that key
//! then observes. The key map itself is only locked to look up or create slots,
//! so a slow resolution never holds back other keys.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Hit and miss counters of a [`TtlCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that ran the computation
    pub misses: u64,
}

impl CacheStats {
    /// Calculate cache hit ratio (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedEntry<V> {
    value: V,
    fetched_at: Instant,
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CachedEntry<V>>>>;

/// A keyed cache whose entries expire after a fixed TTL.
pub struct TtlCache<K, V> {
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The validity window of an entry.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &K) -> Option<Slot<V>> {
        self.lock_slots().get(key).cloned()
    }

    fn snapshot(&self) -> Vec<Slot<V>> {
        self.lock_slots().values().cloned().collect()
    }

    /// Return the fresh value for `key`, computing and storing it otherwise.
    ///
    /// Only callers of the same key wait for each other. Failed computations
    /// are not stored.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `init`.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = Arc::clone(self.lock_slots().entry(key).or_default());
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("discovery cache hit");
                return Ok(cached.value.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(ttl = ?self.ttl, "discovery cache miss, resolving");

        let value = init().await?;
        *entry = Some(CachedEntry {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Return the value for `key` if it is still fresh.
    ///
    /// Waits for an in-flight resolution of the same key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let slot = self.slot(key)?;
        let entry = slot.lock().await;
        entry
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.value.clone())
    }

    /// Drop the entry for `key`.
    pub async fn invalidate(&self, key: &K) {
        // an in-flight resolution of `key` completes into the detached slot
        self.lock_slots().remove(key);
    }

    /// Drop every entry and reset the counters.
    pub async fn clear(&self) {
        self.lock_slots().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries, fresh or not.
    pub async fn len(&self) -> usize {
        let mut stored = 0;
        for slot in self.snapshot() {
            if slot.lock().await.is_some() {
                stored += 1;
            }
        }
        stored
    }

    /// Returns true when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current hit and miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
