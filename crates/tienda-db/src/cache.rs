//! # TTL Cache
//!
//! Process-local cache for expensive aggregations (reports, product lists).
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  set(key, value, ttl)                                                  │
//! │     │  full and key is new? → evict the OLDEST-INSERTED key (FIFO)     │
//! │     ▼                                                                   │
//! │  ┌──────────────────────────────┐                                      │
//! │  │ entry { data, inserted_at,   │                                      │
//! │  │         ttl }                │                                      │
//! │  └──────────────┬───────────────┘                                      │
//! │                 │                                                       │
//! │     get(key)    │   now - inserted_at > ttl ?                          │
//! │     ────────────┼──────────────────────────────                        │
//! │        no  ──► hit, clone of data                                      │
//! │        yes ──► miss, entry purged on the spot                          │
//! │                                                                         │
//! │  sweeper task (every sweep_interval): purge_expired()                  │
//! │  invalidate_pattern("products:") after every product write             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Eviction is by insertion order, not by use. Re-setting an existing key
//! refreshes its value and TTL but keeps its place in the eviction queue.
//!
//! The cache is an ordinary value: construct one, wrap it in an `Arc`, and
//! hand it to whoever needs it.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

// =============================================================================
// Entries & Stats
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

/// Counters since construction (or the last `clear`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub size: usize,
    pub capacity: usize,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys in insertion order; front is the next eviction victim.
    order: VecDeque<String>,
    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// A capacity-bounded map whose entries expire after a per-entry TTL.
#[derive(Debug)]
pub struct TtlCache<V> {
    state: Mutex<CacheState<V>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache. A zero capacity is treated as 1.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        TtlCache {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                stats: CacheStats {
                    capacity,
                    ..Default::default()
                },
            }),
            capacity,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // The cache holds no invariants a panicking holder could break halfway,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value if present and not expired.
    ///
    /// An expired entry found here is removed immediately.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.lock();

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let data = entry.data.clone();
                state.stats.hits += 1;
                trace!(key, "Cache hit");
                return Some(data);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            state.stats.expired += 1;
        }
        state.stats.misses += 1;
        trace!(key, expired, "Cache miss");
        None
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// When the cache is full and `key` is new, exactly one entry (the
    /// oldest inserted) is evicted first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            data: value,
            inserted_at: Instant::now(),
            ttl,
        };

        let mut state = self.lock();

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        if state.entries.len() >= self.capacity {
            if let Some(victim) = state.order.pop_front() {
                state.entries.remove(&victim);
                state.stats.evictions += 1;
                debug!(key = %victim, "Cache full, evicted oldest entry");
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }

    /// Stores `value` with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key)
    }

    /// Removes every entry and resets the counters.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
        state.stats = CacheStats {
            capacity: self.capacity,
            ..Default::default()
        };
    }

    /// Removes every key containing `pattern`. Returns how many were removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();

        state.entries.retain(|key, _| !key.contains(pattern));
        state.order.retain(|key| !key.contains(pattern));

        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(pattern, removed, "Cache entries invalidated");
        }
        removed
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();

        state.entries.retain(|_, entry| !entry.is_expired(now));
        let CacheState { entries, order, .. } = &mut *state;
        order.retain(|key| entries.contains_key(key));

        let removed = before - state.entries.len();
        state.stats.expired += removed as u64;
        removed
    }

    /// Returns the cached value, or runs `producer` and caches its result.
    ///
    /// The producer runs at most once per call. Two concurrent misses on the
    /// same key may both run their producer; the later `set` wins. A producer
    /// error is returned as-is and nothing is cached.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let value = producer().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            size: state.entries.len(),
            ..state.stats
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Spawns the background sweep that calls [`purge_expired`] every
    /// `interval`.
    ///
    /// The task holds only a weak reference and stops once the cache is
    /// dropped. Abort the handle to stop it earlier.
    ///
    /// [`purge_expired`]: TtlCache::purge_expired
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("Cache dropped, sweeper exiting");
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(10, TTL);
        cache.set("report:1", 42, TTL);

        advance(Duration::from_millis(50)).await;
        assert_eq!(cache.get("report:1"), Some(42));

        advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get("report:1"), None);
        // Purged on read
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_oldest_inserted() {
        let cache = TtlCache::new(3, TTL);
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        cache.set("c", 3, TTL);

        // Reading "a" does not protect it: eviction is FIFO, not LRU
        assert_eq!(cache.get("a"), Some(1));
        // Updating an existing key neither evicts nor reorders
        cache.set("a", 10, TTL);
        assert_eq!(cache.len(), 3);

        cache.set("d", 4, TTL);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = TtlCache::new(10, TTL);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { capacity: 10, ..Default::default() });
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let cache = TtlCache::new(10, TTL);
        cache.insert("products:1:20", 1);
        cache.insert("products:2:20", 2);
        cache.insert("report:financial:x", 3);

        assert_eq!(cache.invalidate_pattern("products:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("report:financial:x"), Some(3));

        // Order queue stays in sync: refill to capacity without surprises
        for i in 0..9 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 10);
        cache.insert("overflow", 99);
        assert_eq!(cache.get("report:financial:x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_respects_per_entry_ttl() {
        let cache = TtlCache::new(10, TTL);
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(10));

        advance(Duration::from_millis(20)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test]
    async fn test_get_or_insert_with_runs_producer_once_per_miss() {
        let cache = TtlCache::new(10, TTL);
        let mut calls = 0;

        let first: Result<i32, String> = cache
            .get_or_insert_with("k", TTL, || {
                calls += 1;
                async { Ok(7) }
            })
            .await;
        assert_eq!(first, Ok(7));

        let second: Result<i32, String> = cache
            .get_or_insert_with("k", TTL, || {
                calls += 1;
                async { Ok(8) }
            })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_does_not_cache_errors() {
        let cache: TtlCache<i32> = TtlCache::new(10, TTL);

        let failed: Result<i32, &str> = cache
            .get_or_insert_with("k", TTL, || async { Err("db down") })
            .await;
        assert_eq!(failed, Err("db down"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let cache = Arc::new(TtlCache::new(10, TTL));
        cache.set("a", 1, TTL);
        let handle = cache.spawn_sweeper(Duration::from_secs(60));

        advance(Duration::from_secs(61)).await;
        // Let the sweeper task run its tick
        tokio::task::yield_now().await;

        assert_eq!(cache.len(), 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_cache_dropped() {
        let cache = Arc::new(TtlCache::<i32>::new(10, TTL));
        let handle = cache.spawn_sweeper(Duration::from_secs(1));
        drop(cache);

        advance(Duration::from_secs(2)).await;
        handle.await.unwrap();
    }
}
