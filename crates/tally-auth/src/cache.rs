//! Keyed cache of server resources.
//!
//! Entries are addressed by a [`QueryKey`], a list of segments such as
//! `["summary", "2024", "5"]`. Invalidating a key marks every entry whose key
//! starts with it as stale, so `["summary"]` covers all months at once.
//!
//! Every invalidation or clear advances the cache epoch. A fetch records the
//! epoch before it goes out and stores its result with
//! [`DataCache::put_if_epoch`], so data fetched for a user who has since
//! signed out never lands in the cache.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default upper bound on cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Hierarchical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Append one segment.
    pub fn with(mut self, segment: impl ToString) -> Self {
        self.0.push(segment.to_string());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` matches this key segment by segment.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// Cache of server data that the session layer resets on user change.
pub trait DataCache: Send + Sync {
    /// Fresh value for `key`, if any.
    fn get(&self, key: &QueryKey) -> Option<Value>;

    fn put(&self, key: QueryKey, value: Value);

    /// Current epoch; advanced by every invalidation and by [`clear`](Self::clear).
    fn epoch(&self) -> u64;

    /// Store `value` only if the epoch is still `epoch`. Returns whether it
    /// was stored.
    fn put_if_epoch(&self, key: QueryKey, value: Value, epoch: u64) -> bool;

    /// Mark every entry under `prefix` as stale.
    fn invalidate(&self, prefix: &QueryKey);

    /// Mark every entry as stale.
    fn invalidate_all(&self);

    /// Drop every entry.
    fn clear(&self);
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    stale: bool,
}

/// In-memory [`DataCache`] with a freshness window and an entry cap.
pub struct QueryCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    /// Only written with `entries` locked.
    epoch: AtomicU64,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value for `key` even if stale.
    pub fn peek(&self, key: &QueryKey) -> Option<Value> {
        self.entries.lock().get(key).map(|e| e.value.clone())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        !entry.stale && entry.stored_at.elapsed() <= self.ttl
    }

    fn insert(&self, entries: &mut HashMap<QueryKey, CacheEntry>, key: QueryKey, value: Value) {
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                stale: false,
            },
        );
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl DataCache for QueryCache {
    fn get(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.value.clone())
    }

    fn put(&self, key: QueryKey, value: Value) {
        let mut entries = self.entries.lock();
        self.insert(&mut entries, key, value);
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn put_if_epoch(&self, key: QueryKey, value: Value, epoch: u64) -> bool {
        let mut entries = self.entries.lock();
        if self.epoch() != epoch {
            debug!(key = %key, "Dropping result fetched before invalidation");
            return false;
        }
        self.insert(&mut entries, key, value);
        true
    }

    fn invalidate(&self, prefix: &QueryKey) {
        let mut entries = self.entries.lock();
        self.advance_epoch();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                count += 1;
            }
        }
        debug!(prefix = %prefix, count, "Invalidated cached queries");
    }

    fn invalidate_all(&self) {
        let mut entries = self.entries.lock();
        self.advance_epoch();
        for entry in entries.values_mut() {
            entry.stale = true;
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.lock();
        self.advance_epoch();
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_then_get() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.put(QueryKey::from(["accounts"]), json!([{"id": 1}]));
        assert_eq!(
            cache.get(&QueryKey::from(["accounts"])),
            Some(json!([{"id": 1}]))
        );
    }

    #[test]
    fn test_invalidate_matches_by_prefix() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.put(QueryKey::from(["summary"]).with(2024).with(5), json!(1));
        cache.put(QueryKey::from(["summary"]).with(2024).with(6), json!(2));
        cache.put(QueryKey::from(["spendingByCategory"]), json!(3));

        cache.invalidate(&QueryKey::from(["summary"]));

        assert!(cache
            .get(&QueryKey::from(["summary", "2024", "5"]))
            .is_none());
        assert!(cache
            .get(&QueryKey::from(["summary", "2024", "6"]))
            .is_none());
        assert!(cache.get(&QueryKey::from(["spendingByCategory"])).is_some());
        // Stale data is kept until refetched.
        assert_eq!(
            cache.peek(&QueryKey::from(["summary", "2024", "5"])),
            Some(json!(1))
        );
    }

    #[test]
    fn test_prefix_is_segment_based() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.put(QueryKey::from(["categories", "all"]), json!([]));
        cache.put(QueryKey::from(["categoriesArchive"]), json!([]));

        cache.invalidate(&QueryKey::from(["categories"]));

        assert!(cache.get(&QueryKey::from(["categories", "all"])).is_none());
        assert!(cache.get(&QueryKey::from(["categoriesArchive"])).is_some());
    }

    #[test]
    fn test_invalidate_all_and_clear() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.put(QueryKey::from(["accounts"]), json!([]));
        cache.put(QueryKey::from(["budgets"]), json!([]));

        cache.invalidate_all();
        assert!(cache.get(&QueryKey::from(["accounts"])).is_none());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_refreshes_stale_entry() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = QueryKey::from(["profile"]);
        cache.put(key.clone(), json!({"username": "alice"}));
        cache.invalidate(&key);

        cache.put(key.clone(), json!({"username": "alicia"}));
        assert_eq!(cache.get(&key), Some(json!({"username": "alicia"})));
    }

    #[test]
    fn test_expired_entries_are_not_returned() {
        let cache = QueryCache::new(Duration::ZERO);
        let key = QueryKey::from(["accounts"]);
        cache.put(key.clone(), json!([]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = QueryCache::with_capacity(Duration::from_secs(60), 2);
        cache.put(QueryKey::from(["a"]), json!(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(QueryKey::from(["b"]), json!(2));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(QueryKey::from(["c"]), json!(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&QueryKey::from(["a"])).is_none());
        assert!(cache.get(&QueryKey::from(["c"])).is_some());
    }

    #[test]
    fn test_put_after_clear_is_dropped() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = QueryKey::from(["accounts"]);
        let epoch = cache.epoch();

        cache.clear();

        assert!(!cache.put_if_epoch(key.clone(), json!([{"id": 1}]), epoch));
        assert!(cache.is_empty());
        assert!(cache.put_if_epoch(key.clone(), json!([]), cache.epoch()));
        assert_eq!(cache.get(&key), Some(json!([])));
    }

    #[test]
    fn test_invalidation_advances_epoch() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let start = cache.epoch();

        cache.invalidate(&QueryKey::from(["summary"]));
        cache.invalidate_all();

        assert_eq!(cache.epoch(), start + 2);
        assert!(!cache.put_if_epoch(QueryKey::from(["summary"]), json!(1), start));
    }

    #[test]
    fn test_key_display() {
        let key = QueryKey::from(["transactions", "all"]);
        assert_eq!(key.to_string(), "transactions/all");
    }
}
