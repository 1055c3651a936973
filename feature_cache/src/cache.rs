//! TTL and capacity bounded cache with per-key fetch coalescing.
//!
//! The directory lives behind one mutex that is never held while a value is
//! computed. A key being computed is marked in-flight; other callers for that
//! key park on a condition variable until the leader stores its value or
//! gives up, so at most one compute per key runs at a time. Failed computes
//! are not cached and the next waiter takes over.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::CacheConfig;

struct Entry<V> {
    value: Arc<V>,
    expires: Instant,
    last_access: u64,
}

struct Directory<K, V> {
    entries: HashMap<K, Entry<V>>,
    inflight: HashSet<K>,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> Directory<K, V> {
    fn lookup(&mut self, key: &K, now: Instant) -> Option<Arc<V>> {
        let expired = match self.entries.get_mut(key) {
            Some(entry) if entry.expires > now => {
                self.clock += 1;
                entry.last_access = self.clock;
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn insert(&mut self, key: K, value: Arc<V>, expires: Instant, config: &CacheConfig) {
        self.clock += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                expires,
                last_access: self.clock,
            },
        );
        if self.entries.len() > config.max_size {
            let overflow = self.entries.len() - config.max_size;
            self.prune(config.items_to_prune.max(overflow), Instant::now());
        }
    }

    /// Drops expired entries, then least recently used ones, `quota` in total at least.
    fn prune(&mut self, quota: usize, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires > now);
        let expired = before - self.entries.len();
        let remaining_quota = quota.saturating_sub(expired);

        if remaining_quota > 0 && !self.entries.is_empty() {
            let mut by_age: Vec<(u64, K)> = self
                .entries
                .iter()
                .map(|(key, entry)| (entry.last_access, key.clone()))
                .collect();
            let cut = remaining_quota.min(by_age.len());
            if cut < by_age.len() {
                by_age.select_nth_unstable_by_key(cut, |(age, _)| *age);
            }
            for (_, key) in by_age.into_iter().take(cut) {
                self.entries.remove(&key);
            }
        }
        debug!(
            expired,
            evicted = before - self.entries.len(),
            remaining = self.entries.len(),
            "feature cache pruned"
        );
    }
}

pub struct FeatureCache<K, V> {
    directory: Mutex<Directory<K, V>>,
    ready: Condvar,
    config: CacheConfig,
}

/// Clears the in-flight mark for a key when the leader finishes or unwinds.
struct Inflight<'a, K: Eq + Hash + Clone, V> {
    cache: &'a FeatureCache<K, V>,
    key: &'a K,
}

impl<K: Eq + Hash + Clone, V> Drop for Inflight<'_, K, V> {
    fn drop(&mut self) {
        self.cache.directory.lock().inflight.remove(self.key);
        self.cache.ready.notify_all();
    }
}

impl<K: Eq + Hash + Clone, V> FeatureCache<K, V> {
    pub fn new(config: CacheConfig) -> Self {
        let config = config.normalized();
        Self {
            directory: Mutex::new(Directory {
                entries: HashMap::new(),
                inflight: HashSet::new(),
                clock: 0,
            }),
            ready: Condvar::new(),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value for `key` or computes, stores and returns it.
    ///
    /// Concurrent callers for the same missing key wait for the first one
    /// instead of computing again.
    pub fn fetch<E, F>(&self, key: &K, ttl: Duration, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut directory = self.directory.lock();
        loop {
            if let Some(value) = directory.lookup(key, Instant::now()) {
                return Ok(value);
            }
            if !directory.inflight.contains(key) {
                break;
            }
            self.ready.wait(&mut directory);
        }
        directory.inflight.insert(key.clone());
        drop(directory);

        let _inflight = Inflight { cache: self, key };
        let value = Arc::new(compute()?);
        self.directory.lock().insert(
            key.clone(),
            Arc::clone(&value),
            Instant::now() + ttl,
            &self.config,
        );
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.directory.lock().lookup(key, Instant::now())
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.directory
            .lock()
            .insert(key, Arc::new(value), Instant::now() + ttl, &self.config);
    }

    pub fn batch_set<I>(&self, items: I, ttl: Duration)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let expires = Instant::now() + ttl;
        let mut directory = self.directory.lock();
        for (key, value) in items {
            directory.insert(key, Arc::new(value), expires, &self.config);
        }
    }

    pub fn delete(&self, key: &K) -> bool {
        self.directory.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.directory.lock().entries.clear();
    }

    /// Entries currently held, expired ones included until they are touched or pruned.
    pub fn len(&self) -> usize {
        self.directory.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
