//! Memoized page renders and page text

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Size of a cached value, counted against the byte budget
pub trait CacheWeight {
    fn weight(&self) -> usize;
}

impl CacheWeight for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

struct Slots<K: Hash + Eq, V> {
    lru: LruCache<K, V>,
    bytes: usize,
}

/// LRU cache bounded by entry count and by the summed [`CacheWeight`] of its values
pub struct CacheManager<K: Hash + Eq, V> {
    slots: Mutex<Slots<K, V>>,
    max_bytes: usize,
}

impl<K: Hash + Eq + Clone, V: CacheWeight + Clone> CacheManager<K, V> {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(Slots {
                lru: LruCache::new(capacity),
                bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Values heavier than the whole budget are dropped
    fn insert(&self, key: K, value: V) {
        let weight = value.weight();
        if weight > self.max_bytes {
            tracing::debug!(weight, budget = self.max_bytes, "value too large to cache");
            return;
        }

        let mut slots = self.slots.lock();
        if let Some(previous) = slots.lru.pop(&key) {
            slots.bytes -= previous.weight();
        }
        while slots.bytes + weight > self.max_bytes {
            match slots.lru.pop_lru() {
                Some((_, evicted)) => slots.bytes -= evicted.weight(),
                None => break,
            }
        }
        // `push` evicts by entry count on its own
        if let Some((_, evicted)) = slots.lru.push(key, value) {
            slots.bytes -= evicted.weight();
        }
        slots.bytes += weight;
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.slots.lock().lru.get(key).cloned()
    }

    /// Cached value for `key`, or the result of `load`, which is cached on success.
    ///
    /// The lock is not held while `load` runs.
    pub fn get_or_try_insert<E>(
        &self,
        key: K,
        load: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.slots.lock().bytes
    }
}
