// Cache — memoized values that can all be dropped at once
//
// A model memoizes a few values that are expensive or must stay fixed
// between calls (the preview latent batch, the prior's log-normalizer).
// Every cache is created through a CacheRegistry, and
// `CacheRegistry::clear_all()` empties all of them in one call.
//
// The registry is a handle, not a global: each model owns one, and clones
// share the same set of caches.
//
//   let registry = CacheRegistry::new();
//   let cache: MemoCache<usize, f64> = registry.cache(8);
//   let v = cache.get_or_try_insert_with(3, || Ok(expensive(3)))?;
//   registry.clear_all();

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use wgan_core::error::{Error, Result};

/// Anything a registry can clear.
pub trait Clearable: Send + Sync {
    fn clear(&self);
}

/// Shared handle to a set of caches.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<Mutex<Vec<Weak<dyn Clearable>>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `capacity` entries, registered here.
    /// A capacity of 0 is treated as 1.
    pub fn cache<K, V>(&self, capacity: usize) -> MemoCache<K, V>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        let cache = MemoCache::unregistered(capacity);
        let entry: Arc<dyn Clearable> = cache.inner.clone();
        if let Ok(mut caches) = self.caches.lock() {
            caches.push(Arc::downgrade(&entry));
        }
        cache
    }

    /// Empty every live cache created by this registry. Returns how many
    /// caches were cleared.
    pub fn clear_all(&self) -> usize {
        let Ok(mut caches) = self.caches.lock() else {
            return 0;
        };
        caches.retain(|w| w.strong_count() > 0);
        for cache in caches.iter().filter_map(Weak::upgrade) {
            cache.clear();
        }
        caches.len()
    }

    /// Number of caches still alive.
    pub fn len(&self) -> usize {
        self.caches
            .lock()
            .map(|c| c.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheRegistry({} caches)", self.len())
    }
}

struct Entries<K, V> {
    map: HashMap<K, V>,
    // Least recently used first.
    order: VecDeque<K>,
    hits: u64,
    misses: u64,
}

struct CacheInner<K, V> {
    capacity: usize,
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> Clearable for CacheInner<K, V>
where
    K: Send,
    V: Send,
{
    fn clear(&self) {
        if let Ok(mut e) = self.entries.lock() {
            e.map.clear();
            e.order.clear();
        }
    }
}

/// Bounded least-recently-used memoization table.
///
/// Clones share the same entries.
pub struct MemoCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for MemoCache<K, V> {
    fn clone(&self) -> Self {
        MemoCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// A cache no registry knows about. `clear_all` will not reach it.
    pub fn unregistered(capacity: usize) -> Self {
        MemoCache {
            inner: Arc::new(CacheInner {
                capacity: capacity.max(1),
                entries: Mutex::new(Entries {
                    map: HashMap::new(),
                    order: VecDeque::new(),
                    hits: 0,
                    misses: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries<K, V>>> {
        self.inner
            .entries
            .lock()
            .map_err(|_| Error::msg("cache lock poisoned"))
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let mut e = self.lock()?;
        let value = e.map.get(key).cloned();
        if value.is_some() {
            e.hits += 1;
            touch(&mut e.order, key);
        } else {
            e.misses += 1;
        }
        Ok(value)
    }

    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let mut e = self.lock()?;
        if e.map.insert(key.clone(), value).is_some() {
            touch(&mut e.order, &key);
            return Ok(());
        }
        e.order.push_back(key);
        while e.order.len() > self.inner.capacity {
            if let Some(old) = e.order.pop_front() {
                e.map.remove(&old);
            }
        }
        Ok(())
    }

    /// Cached value for `key`, computing and storing it on a miss.
    ///
    /// The lock is not held while `f` runs, so `f` may use other caches.
    /// An error from `f` is returned and nothing is stored.
    pub fn get_or_try_insert_with<F>(&self, key: K, f: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(&key)? {
            return Ok(v);
        }
        let v = f()?;
        self.insert(key, v.clone())?;
        Ok(v)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation. Clearing keeps the counters.
    pub fn stats(&self) -> (u64, u64) {
        self.lock().map(|e| (e.hits, e.misses)).unwrap_or((0, 0))
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

fn touch<K: Eq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoizes_until_cleared() {
        let registry = CacheRegistry::new();
        let cache: MemoCache<u32, u32> = registry.cache(4);
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with(7, || {
                    calls += 1;
                    Ok(49)
                })
                .unwrap();
            assert_eq!(v, 49);
        }
        assert_eq!(calls, 1);

        assert_eq!(registry.clear_all(), 1);
        assert!(cache.is_empty());
        cache.get_or_try_insert_with(7, || Ok(50)).unwrap();
        assert_eq!(cache.get(&7).unwrap(), Some(50));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: MemoCache<u32, u32> = MemoCache::unregistered(2);
        cache.insert(1, 10).unwrap();
        cache.insert(2, 20).unwrap();
        cache.get(&1).unwrap();
        cache.insert(3, 30).unwrap();
        assert_eq!(cache.get(&2).unwrap(), None);
        assert_eq!(cache.get(&1).unwrap(), Some(10));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_compute_is_not_stored() {
        let cache: MemoCache<u32, u32> = MemoCache::unregistered(2);
        let r = cache.get_or_try_insert_with(1, || Err(Error::msg("boom")));
        assert!(r.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dropped_caches_leave_the_registry() {
        let registry = CacheRegistry::new();
        let keep: MemoCache<u8, u8> = registry.cache(1);
        {
            let _gone: MemoCache<u8, u8> = registry.cache(1);
            assert_eq!(registry.len(), 2);
        }
        assert_eq!(registry.len(), 1);
        keep.insert(1, 1).unwrap();
        registry.clone().clear_all();
        assert!(keep.is_empty());
    }
}
