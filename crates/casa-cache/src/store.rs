//! TTL cache with substring invalidation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use casa_core::{Clock, SystemClock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};

/// A stored value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
    epoch: u64,
}

impl CacheEntry {
    /// The stored JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// When the entry was stored.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time-to-live the entry was stored with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the entry has expired at `now`.
    ///
    /// An entry is readable only while `now < created_at + ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.created_at + self.ttl
    }

    /// Age at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Remaining TTL at `now` (zero once expired).
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        (self.created_at + self.ttl).saturating_duration_since(now)
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing usable.
    pub misses: u64,
    /// Entries removed because they expired.
    pub evictions: u64,
    /// Entries removed by `delete`, `invalidate` or `clear`.
    pub invalidated: u64,
    /// Guarded writes discarded because a newer write or removal won.
    pub rejected_writes: u64,
}

impl CacheStats {
    /// Fraction of reads that were hits.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Outstanding write tokens per key.
    reserved: HashMap<String, usize>,
    /// Epoch of the last removal of a key that had outstanding tokens.
    floors: HashMap<String, u64>,
    epoch: u64,
    stats: CacheStats,
}

impl Inner {
    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Record a removal so tokens reserved before it cannot commit.
    fn mark_removed(&mut self, key: &str, epoch: u64) {
        if self.reserved.contains_key(key) {
            let floor = self.floors.entry(key.to_string()).or_insert(0);
            *floor = (*floor).max(epoch);
        }
    }

    /// Drop an entry that expired or no longer decodes.
    ///
    /// Its epoch becomes the key's floor, so an older pending write cannot
    /// take its place.
    fn evict(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.mark_removed(key, entry.epoch);
                true
            }
            None => false,
        }
    }
}

/// Process-local cache of JSON values with per-entry expiry.
///
/// Expiry is lazy: an expired entry is evicted by the read that finds it
/// (or by `purge_expired`). Values are stored as `serde_json::Value` so one
/// cache can front every resource family; typed access goes through serde.
///
/// The cache is not shared across processes. Each instance of a horizontally
/// scaled deployment has its own entries, kept loosely consistent only by
/// their TTLs.
#[derive(Debug)]
pub struct TtlCache {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    /// Create a cache backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache backed by a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// A zero TTL is rejected with `CacheError::InvalidTtl`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(ttl));
        }
        let value = serde_json::to_value(value)?;
        let now = self.now();

        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        inner.floors.remove(key);
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
                epoch,
            },
        );
        debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        Ok(())
    }

    /// Fetch the raw entry if present and unexpired, evicting it if expired.
    fn lookup(&self, key: &str) -> Option<Value> {
        let now = self.now();
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };

        if expired && inner.evict(key) {
            inner.stats.evictions += 1;
            debug!(key, "cache entry expired");
        }
        None
    }

    fn record_read(&self, hit: bool) {
        let mut inner = self.lock();
        if hit {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
    }

    /// Read a typed value.
    ///
    /// `None` means absent: never stored, expired, removed, or no longer
    /// decodable as `T` (in which case the entry is dropped).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(value) = self.lookup(key) else {
            self.record_read(false);
            return None;
        };

        match serde_json::from_value(value) {
            Ok(decoded) => {
                self.record_read(true);
                Some(decoded)
            }
            Err(e) => {
                warn!(key, error = %e, "cached value does not match requested type, dropping");
                let mut inner = self.lock();
                inner.evict(key);
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Read the raw JSON value.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let value = self.lookup(key);
        self.record_read(value.is_some());
        value
    }

    /// Whether `key` holds an unexpired entry.
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Remove a single entry. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        if inner.entries.remove(key).is_some() {
            inner.stats.invalidated += 1;
        }
        inner.mark_removed(key, epoch);
    }

    /// Remove every entry whose key contains `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();

        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - inner.entries.len();
        inner.stats.invalidated += removed as u64;

        let pending: Vec<String> = inner
            .reserved
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();
        for key in pending {
            inner.floors.insert(key, epoch);
        }

        info!(pattern, removed, "cache invalidated");
        removed
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.stats.invalidated += removed as u64;

        let pending: Vec<String> = inner.reserved.keys().cloned().collect();
        for key in pending {
            inner.floors.insert(key, epoch);
        }
        info!(removed, "cache cleared");
    }

    /// Evict every expired entry. Returns the number evicted.
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.evict(key);
        }
        inner.stats.evictions += expired.len() as u64;
        expired.len()
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = self.now();
        self.lock()
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether there are no unexpired entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of unexpired entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.now();
        let mut keys: Vec<String> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Snapshot of an unexpired entry, without counting as a read.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Reserve a guarded write for `key`.
    ///
    /// The token's commit succeeds only if no newer write and no removal of
    /// `key` happened after this reservation.
    pub fn reserve(&self, key: &str) -> WriteToken<'_> {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        *inner.reserved.entry(key.to_string()).or_insert(0) += 1;
        WriteToken {
            cache: self,
            key: key.to_string(),
            epoch,
        }
    }

    fn commit_value(&self, key: &str, epoch: u64, value: Value, ttl: Duration) -> CacheResult<bool> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(ttl));
        }
        let now = self.now();
        let mut inner = self.lock();

        let floor = inner.floors.get(key).copied().unwrap_or(0);
        let current = inner.entries.get(key).map(|e| e.epoch).unwrap_or(0);
        if epoch <= floor || epoch <= current {
            inner.stats.rejected_writes += 1;
            debug!(key, epoch, floor, current, "stale cache write discarded");
            return Ok(false);
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
                epoch,
            },
        );
        debug!(key, ttl_secs = ttl.as_secs(), epoch, "cache commit");
        Ok(true)
    }

    fn release(&self, key: &str) {
        let mut inner = self.lock();
        let remaining = match inner.reserved.get_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            inner.reserved.remove(key);
            inner.floors.remove(key);
        }
    }
}

/// A reserved, epoch-stamped write slot for one key.
///
/// Dropping the token without committing releases the reservation.
#[derive(Debug)]
pub struct WriteToken<'a> {
    cache: &'a TtlCache,
    key: String,
    epoch: u64,
}

impl WriteToken<'_> {
    /// The reserved key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The reservation epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Store `value` if this reservation is still the newest for its key.
    ///
    /// Returns `Ok(false)` when a newer write or a removal won.
    pub fn commit<T: Serialize + ?Sized>(self, value: &T, ttl: Duration) -> CacheResult<bool> {
        let value = serde_json::to_value(value)?;
        self.commit_value(value, ttl)
    }

    /// Store an already serialized value.
    pub fn commit_value(self, value: Value, ttl: Duration) -> CacheResult<bool> {
        self.cache.commit_value(&self.key, self.epoch, value, ttl)
    }
}

impl Drop for WriteToken<'_> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use casa_core::ManualClock;
    use serde::Deserialize;

    use super::*;

    fn cache_with_clock() -> (TtlCache, ManualClock) {
        let clock = ManualClock::new();
        (TtlCache::with_clock(Arc::new(clock.clone())), clock)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stats {
        total: u32,
        featured: u32,
    }

    // === Expiry Tests ===

    #[test]
    fn test_set_then_get() {
        let (cache, _) = cache_with_clock();
        cache.set("products:stats", &Stats { total: 10, featured: 2 }, Duration::from_secs(60)).unwrap();

        let stats: Option<Stats> = cache.get("products:stats");
        assert_eq!(stats, Some(Stats { total: 10, featured: 2 }));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", &"v", Duration::from_secs(5)).unwrap();

        clock.advance(Duration::from_millis(4_999));
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_expired_read_evicts() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", &1, Duration::from_secs(1)).unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(!cache.has("k"));
        assert!(cache.entry("k").is_none());
        assert_eq!(cache.stats().evictions, 1);
        // Second read finds nothing to evict.
        assert!(!cache.has("k"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_falsy_values_are_not_absent() {
        let (cache, _) = cache_with_clock();
        cache.set("zero", &0, Duration::from_secs(10)).unwrap();
        cache.set("empty", &Vec::<u32>::new(), Duration::from_secs(10)).unwrap();
        cache.set("null", &Option::<u32>::None, Duration::from_secs(10)).unwrap();

        assert_eq!(cache.get::<u32>("zero"), Some(0));
        assert_eq!(cache.get::<Vec<u32>>("empty"), Some(vec![]));
        assert_eq!(cache.get::<Option<u32>>("null"), Some(None));
        assert_eq!(cache.get::<Option<u32>>("missing"), None);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let (cache, _) = cache_with_clock();
        let err = cache.set("k", &1, Duration::ZERO).unwrap_err();
        assert!(matches!(err, CacheError::InvalidTtl(_)));
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_set_overwrites_and_resets_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", &"old", Duration::from_secs(10)).unwrap();
        clock.advance(Duration::from_secs(8));
        cache.set("k", &"new", Duration::from_secs(10)).unwrap();
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get::<String>("k"), Some("new".to_string()));
    }

    #[test]
    fn test_type_mismatch_is_absent() {
        let (cache, _) = cache_with_clock();
        cache.set("k", &"not a number", Duration::from_secs(10)).unwrap();

        assert_eq!(cache.get::<u32>("k"), None);
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_entry_metadata() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", &1, Duration::from_secs(10)).unwrap();
        clock.advance(Duration::from_secs(3));

        let entry = cache.entry("k").unwrap();
        let now = clock.now();
        assert_eq!(entry.ttl(), Duration::from_secs(10));
        assert_eq!(entry.age(now), Duration::from_secs(3));
        assert_eq!(entry.remaining_ttl(now), Duration::from_secs(7));
        assert_eq!(entry.value(), &serde_json::json!(1));
    }

    // === Delete / Invalidate Tests ===

    #[test]
    fn test_delete_idempotent() {
        let (cache, _) = cache_with_clock();
        cache.set("a", &1, Duration::from_secs(10)).unwrap();

        cache.delete("missing");
        assert_eq!(cache.keys(), vec!["a".to_string()]);

        cache.delete("a");
        cache.delete("a");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_substring() {
        let (cache, _) = cache_with_clock();
        let ttl = Duration::from_secs(60);
        cache.set("products:list:1", &1, ttl).unwrap();
        cache.set("products:stats", &2, ttl).unwrap();
        cache.set("categories:all", &3, ttl).unwrap();

        let removed = cache.invalidate("products");

        assert_eq!(removed, 2);
        assert!(!cache.has("products:list:1"));
        assert!(!cache.has("products:stats"));
        assert_eq!(cache.get::<u32>("categories:all"), Some(3));
    }

    #[test]
    fn test_invalidate_matches_anywhere_in_key() {
        let (cache, _) = cache_with_clock();
        let ttl = Duration::from_secs(60);
        cache.set("admin:products:list", &1, ttl).unwrap();
        cache.set("reviews:product:7", &2, ttl).unwrap();

        assert_eq!(cache.invalidate("products"), 1);
        assert_eq!(cache.invalidate("nothing-matches"), 0);
        assert!(cache.has("reviews:product:7"));
    }

    #[test]
    fn test_clear() {
        let (cache, _) = cache_with_clock();
        cache.set("a", &1, Duration::from_secs(10)).unwrap();
        cache.set("b", &2, Duration::from_secs(10)).unwrap();

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidated, 2);
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache_with_clock();
        cache.set("short", &1, Duration::from_secs(1)).unwrap();
        cache.set("long", &2, Duration::from_secs(100)).unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
    }

    #[test]
    fn test_len_ignores_expired() {
        let (cache, clock) = cache_with_clock();
        cache.set("short", &1, Duration::from_secs(1)).unwrap();
        cache.set("long", &2, Duration::from_secs(100)).unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.len(), 1);
    }

    // === Stats Tests ===

    #[test]
    fn test_hit_miss_counters() {
        let (cache, _) = cache_with_clock();
        cache.set("k", &1, Duration::from_secs(10)).unwrap();

        let _ = cache.get::<u32>("k");
        let _ = cache.get_value("k");
        let _ = cache.get::<u32>("other");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_has_does_not_count_reads() {
        let (cache, _) = cache_with_clock();
        cache.set("k", &1, Duration::from_secs(10)).unwrap();
        assert!(cache.has("k"));
        assert_eq!(cache.stats().hits, 0);
    }

    // === Guarded Write Tests ===

    #[test]
    fn test_commit_when_uncontended() {
        let (cache, _) = cache_with_clock();
        let token = cache.reserve("k");
        assert!(token.commit(&"v", Duration::from_secs(10)).unwrap());
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));
    }

    #[test]
    fn test_older_token_cannot_overwrite_newer_commit() {
        let (cache, _) = cache_with_clock();
        let slow = cache.reserve("k");
        let fast = cache.reserve("k");

        assert!(fast.commit(&"fresh", Duration::from_secs(10)).unwrap());
        assert!(!slow.commit(&"stale", Duration::from_secs(10)).unwrap());

        assert_eq!(cache.get::<String>("k"), Some("fresh".to_string()));
        assert_eq!(cache.stats().rejected_writes, 1);
    }

    #[test]
    fn test_token_loses_to_later_plain_set() {
        let (cache, _) = cache_with_clock();
        let token = cache.reserve("k");
        cache.set("k", &"set", Duration::from_secs(10)).unwrap();

        assert!(!token.commit(&"late", Duration::from_secs(10)).unwrap());
        assert_eq!(cache.get::<String>("k"), Some("set".to_string()));
    }

    #[test]
    fn test_token_after_set_wins() {
        let (cache, _) = cache_with_clock();
        cache.set("k", &"old", Duration::from_secs(10)).unwrap();
        let token = cache.reserve("k");

        assert!(token.commit(&"new", Duration::from_secs(10)).unwrap());
        assert_eq!(cache.get::<String>("k"), Some("new".to_string()));
    }

    #[test]
    fn test_token_cannot_resurrect_invalidated_key() {
        let (cache, _) = cache_with_clock();
        let token = cache.reserve("products:list:1");
        cache.invalidate("products");

        assert!(!token.commit(&"pre-write data", Duration::from_secs(10)).unwrap());
        assert!(!cache.has("products:list:1"));
    }

    #[test]
    fn test_token_cannot_resurrect_after_delete_or_clear() {
        let (cache, _) = cache_with_clock();

        let token = cache.reserve("a");
        cache.delete("a");
        assert!(!token.commit(&1, Duration::from_secs(10)).unwrap());

        let token = cache.reserve("b");
        cache.clear();
        assert!(!token.commit(&1, Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_older_token_loses_after_newer_entry_purged() {
        let (cache, clock) = cache_with_clock();
        let slow = cache.reserve("k");
        let fast = cache.reserve("k");
        assert!(fast.commit(&"fresh", Duration::from_secs(1)).unwrap());

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.purge_expired(), 1);

        assert!(!slow.commit(&"stale", Duration::from_secs(60)).unwrap());
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    fn test_older_token_loses_after_newer_entry_expires_on_read() {
        let (cache, clock) = cache_with_clock();
        let slow = cache.reserve("k");
        let fast = cache.reserve("k");
        assert!(fast.commit(&"fresh", Duration::from_secs(1)).unwrap());

        clock.advance(Duration::from_secs(2));
        assert!(!cache.has("k"));

        assert!(!slow.commit(&"stale", Duration::from_secs(60)).unwrap());
        assert!(!cache.has("k"));
        assert_eq!(cache.stats().rejected_writes, 1);
    }

    #[test]
    fn test_older_token_loses_after_undecodable_entry_dropped() {
        let (cache, _) = cache_with_clock();
        let slow = cache.reserve("k");
        let fast = cache.reserve("k");
        assert!(fast.commit(&"fresh", Duration::from_secs(10)).unwrap());

        assert_eq!(cache.get::<u32>("k"), None);

        assert!(!slow.commit(&"stale", Duration::from_secs(10)).unwrap());
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_token_reserved_after_expiry_still_commits() {
        let (cache, clock) = cache_with_clock();
        let pending = cache.reserve("k");
        let first = cache.reserve("k");
        assert!(first.commit(&"first", Duration::from_secs(1)).unwrap());

        clock.advance(Duration::from_secs(2));
        cache.purge_expired();

        let next = cache.reserve("k");
        assert!(next.commit(&"next", Duration::from_secs(10)).unwrap());
        assert_eq!(cache.get::<String>("k"), Some("next".to_string()));
        drop(pending);
    }

    #[test]
    fn test_reservation_released_on_drop() {
        let (cache, _) = cache_with_clock();
        {
            let _token = cache.reserve("k");
            cache.delete("k");
        }
        // Floor for the released reservation is gone; a new token commits.
        let token = cache.reserve("k");
        assert!(token.commit(&1, Duration::from_secs(10)).unwrap());
        assert!(cache.lock().reserved.is_empty());
        assert!(cache.lock().floors.is_empty());
    }

    #[test]
    fn test_commit_rejects_zero_ttl() {
        let (cache, _) = cache_with_clock();
        let token = cache.reserve("k");
        assert!(matches!(
            token.commit(&1, Duration::ZERO),
            Err(CacheError::InvalidTtl(_))
        ));
    }
}
