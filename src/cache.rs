//! `GlobalCache`: an opaque key to value map with optional
//! per-entry TTL and an `on_delete` disposal hook. Backed by `moka`. This
//! cache only ever holds already-decoded in-memory resources (composer
//! images, vector-tile query results), so nothing here needs to survive a
//! process restart.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::notification::RemovalCause;
use moka::sync::Cache;
use moka::Expiry;

const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct Entry<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryExpiry;

impl<K, V> Expiry<K, Entry<V>> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &K, value: &Entry<V>, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Generic TTL cache keyed by any `Hash + Eq` id. Access bumps the entry's
/// TTL (moka's default read behaviour); disposal beyond releasing the
/// cache's own reference is the caller's responsibility — `on_delete` exists
/// purely as a notification hook, not a destructor.
pub struct GlobalCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, Arc<Entry<V>>>,
    default_ttl: Duration,
}

impl<K, V> GlobalCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        Self::with_on_delete(max_capacity, |_, _| {})
    }

    pub fn with_on_delete<F>(max_capacity: u64, on_delete: F) -> Self
    where
        F: Fn(K, V) + Send + Sync + 'static,
        K: Clone,
    {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .eviction_listener(move |k: Arc<K>, v: Arc<Entry<V>>, cause| {
                if !matches!(cause, RemovalCause::Replaced) {
                    on_delete((*k).clone(), v.value.clone());
                }
            })
            .build();
        Self { inner, default_ttl: DEFAULT_TTL }
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        K: Clone,
    {
        self.inner.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: K, value: V)
    where
        K: Clone,
    {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration)
    where
        K: Clone,
    {
        self.inner.insert(key, Arc::new(Entry { value, ttl }));
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn get_after_insert_returns_value() {
        let cache: GlobalCache<u64, String> = GlobalCache::new(100);
        cache.insert(1, "hello".to_string());
        assert_eq!(cache.get(&1), Some("hello".to_string()));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn on_delete_fires_on_explicit_invalidate() {
        let deleted = Arc::new(AtomicU32::new(0));
        let deleted2 = deleted.clone();
        let cache: GlobalCache<u64, u32> = GlobalCache::with_on_delete(100, move |_k, v| {
            deleted2.fetch_add(v, Ordering::SeqCst);
        });
        cache.insert(1, 42);
        cache.invalidate(&1);
        cache.entry_count();
        assert_eq!(deleted.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn custom_ttl_entry_is_retrievable_immediately() {
        let cache: GlobalCache<&str, i32> = GlobalCache::new(100);
        cache.insert_with_ttl("k", 7, Duration::from_millis(10));
        assert_eq!(cache.get(&"k"), Some(7));
    }
}
