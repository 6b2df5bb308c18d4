//! Bounded TTL cache with LRU eviction
//!
//! Entries live in an insertion-ordered map whose order doubles as recency:
//! the front is the least recently used entry, every hit moves an entry to
//! the back. An entry is never handed out once `now > expires_at`.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use sdlc_core::{to_chrono, SharedClock};
use serde::Serialize;
use std::time::Duration;

/// A cached value with its bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// Cache key
    pub key: String,
    /// Payload
    pub value: V,
    /// Insertion time
    pub inserted_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Serialized payload size in bytes
    pub size_bytes: usize,
    /// Number of hits served
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    /// Expired strictly after `expires_at`
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live entries (may include not-yet-swept expired ones)
    pub entries: usize,
    /// Capacity
    pub max_size: usize,
    /// Lookups served
    pub hits: u64,
    /// Lookups missed, including expired entries
    pub misses: u64,
    /// Entries dropped for capacity
    pub evictions: u64,
    /// Entries dropped for expiry
    pub expirations: u64,
    /// hits / (hits + misses), 0 when no lookups
    pub hit_rate: f64,
    /// Sum of entry sizes
    pub approx_bytes: usize,
}

impl CacheStats {
    /// Total lookups
    #[inline]
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Entry count relative to capacity, 0.0-1.0
    #[inline]
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.entries as f64 / self.max_size as f64
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    approx_bytes: usize,
}

impl<V> Inner<V> {
    fn remove_at(&mut self, index: usize) -> Option<CacheEntry<V>> {
        let (_, entry) = self.entries.shift_remove_index(index)?;
        self.approx_bytes = self.approx_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

/// Bounded key/value cache with time-to-live and LRU eviction
#[derive(Debug)]
pub struct TtlCache<V> {
    name: String,
    max_size: usize,
    default_ttl: Duration,
    clock: SharedClock,
    inner: Mutex<Inner<V>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize,
{
    /// Create cache with capacity and default TTL
    #[must_use]
    pub fn new(name: impl Into<String>, max_size: usize, default_ttl: Duration, clock: SharedClock) -> Self {
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            default_ttl,
            clock,
            inner: Mutex::new(Inner {
                entries: IndexMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                approx_bytes: 0,
            }),
        }
    }

    /// Cache name (domain label)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity
    #[inline]
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Default TTL used by [`Self::insert`]
    #[inline]
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a live entry, refreshing its recency
    ///
    /// Expired entries count as a miss and are removed.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let Some(index) = inner.entries.get_index_of(key) else {
            inner.misses += 1;
            return None;
        };

        if inner.entries[index].is_expired(now) {
            inner.remove_at(index);
            inner.expirations += 1;
            inner.misses += 1;
            tracing::trace!(cache = %self.name, key, "expired entry evicted on read");
            return None;
        }

        inner.hits += 1;
        let last = inner.entries.len() - 1;
        inner.entries.move_index(index, last);
        let entry = &mut inner.entries[last];
        entry.hit_count += 1;
        Some(entry.clone())
    }

    /// Get a live value
    #[inline]
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|e| e.value)
    }

    /// Insert with an explicit TTL
    ///
    /// Overwriting an existing key never evicts another entry; a new key at
    /// capacity evicts the least recently used entry first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let size_bytes = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        let entry = CacheEntry {
            key: key.clone(),
            value,
            inserted_at: now,
            expires_at: now + to_chrono(ttl),
            size_bytes,
            hit_count: 0,
        };

        let mut inner = self.inner.lock();
        if let Some(index) = inner.entries.get_index_of(&key) {
            inner.remove_at(index);
        } else if inner.entries.len() >= self.max_size {
            if let Some(evicted) = inner.remove_at(0) {
                inner.evictions += 1;
                tracing::debug!(cache = %self.name, key = %evicted.key, "evicted least recently used entry");
            }
        }
        inner.approx_bytes += size_bytes;
        inner.entries.insert(key, entry);
    }

    /// Insert with the default TTL
    #[inline]
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_index_of(key) {
            Some(index) => inner.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Whether a live entry exists (does not touch recency or counters)
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.approx_bytes = 0;
    }

    /// Drop every entry and zero the counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.approx_bytes = 0;
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        inner.expirations = 0;
    }

    /// Number of stored entries
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Keys from least to most recently used
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let mut freed = 0usize;
        inner.entries.retain(|_, e| {
            let keep = !e.is_expired(now);
            if !keep {
                freed += e.size_bytes;
            }
            keep
        });
        let purged = before - inner.entries.len();
        inner.approx_bytes = inner.approx_bytes.saturating_sub(freed);
        inner.expirations += purged as u64;
        purged
    }

    /// Snapshot of counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            entries: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            approx_bytes: inner.approx_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sdlc_core::ManualClock;

    fn cache(max: usize, clock: &ManualClock) -> TtlCache<String> {
        TtlCache::new("test", max, Duration::from_secs(60), clock.shared())
    }

    #[test]
    fn set_and_get() {
        let clock = ManualClock::starting_now();
        let cache = cache(4, &clock);

        cache.insert("a", "alpha".to_string());

        assert_eq!(cache.get("a").as_deref(), Some("alpha"));
        assert_eq!(cache.get("missing"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn entry_is_live_at_expiry_and_gone_after() {
        let clock = ManualClock::starting_now();
        let cache = cache(4, &clock);
        cache.set("k", "v".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(10));
        assert!(cache.get("k").is_some(), "now == expiry is still live");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.size(), 0, "expired entry evicted on read");
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let clock = ManualClock::starting_now();
        let cache = cache(3, &clock);
        cache.insert("a", "1".to_string());
        cache.insert("b", "2".to_string());
        cache.insert("c", "3".to_string());

        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.insert("d", "4".to_string());

        assert_eq!(cache.size(), 3);
        assert!(!cache.contains("b"));
        assert_eq!(cache.keys(), vec!["c", "a", "d"]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let clock = ManualClock::starting_now();
        let cache = cache(2, &clock);
        cache.insert("a", "1".to_string());
        cache.insert("b", "2".to_string());
        cache.insert("a", "3".to_string());

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("3"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn delete_and_clear() {
        let clock = ManualClock::starting_now();
        let cache = cache(4, &clock);
        cache.insert("a", "1".to_string());
        cache.insert("b", "2".to_string());

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.size(), 1);

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().approx_bytes, 0);
    }

    #[test]
    fn purge_expired_sweeps_everything_stale() {
        let clock = ManualClock::starting_now();
        let cache = cache(8, &clock);
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(100));

        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.keys(), vec!["long"]);
    }

    #[test]
    fn hit_count_tracks_reads() {
        let clock = ManualClock::starting_now();
        let cache = cache(4, &clock);
        cache.insert("a", "1".to_string());
        cache.get("a");
        let entry = cache.get_entry("a").unwrap();
        assert_eq!(entry.hit_count, 2);
        assert_eq!(entry.size_bytes, 3); // "\"1\""
    }

    #[test]
    fn reset_zeroes_counters() {
        let clock = ManualClock::starting_now();
        let cache = cache(4, &clock);
        cache.insert("a", "1".to_string());
        cache.get("a");
        cache.get("b");
        cache.reset();
        assert_eq!(cache.stats(), CacheStats { max_size: 4, ..CacheStats::default() });
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(
            max in 1usize..8,
            ops in proptest::collection::vec((0u8..16, any::<bool>()), 0..64),
        ) {
            let clock = ManualClock::starting_now();
            let cache = cache(max, &clock);
            for (key, read) in ops {
                let key = format!("k{key}");
                if read {
                    cache.get(&key);
                } else {
                    cache.insert(key, "v".to_string());
                }
                prop_assert!(cache.size() <= max);
            }
        }

        #[test]
        fn prop_nothing_returned_after_expiry(
            ttls in proptest::collection::vec(1u64..100, 1..16),
            advance in 0u64..200,
        ) {
            let clock = ManualClock::starting_now();
            let cache = cache(32, &clock);
            for (i, ttl) in ttls.iter().enumerate() {
                cache.set(format!("k{i}"), "v".to_string(), Duration::from_secs(*ttl));
            }
            clock.advance(Duration::from_secs(advance));
            for (i, ttl) in ttls.iter().enumerate() {
                let got = cache.get(&format!("k{i}"));
                prop_assert_eq!(got.is_some(), advance <= *ttl);
            }
        }
    }
}
