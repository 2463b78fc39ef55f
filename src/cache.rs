//! Generic in-memory TTL cache
//!
//! Thread-safe, generic over key/value types. Used to memoize staking
//! reward reads so repeated fee inspections do not hammer the RPC.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

pub struct TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    ttl: Duration,
    data: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Get a live value (expired entries are dropped on access).
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let data = self.data.read().unwrap();
            match data.get(key) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but expired; take the write lock to remove it
        let mut data = self.data.write().unwrap();
        if let Some(entry) = data.get(key) {
            if entry.is_expired(self.ttl) {
                data.remove(key);
            }
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut data = self.data.write().unwrap();
        data.insert(key, CacheEntry::new(value));
    }

    pub fn remove(&self, key: &K) {
        let mut data = self.data.write().unwrap();
        data.remove(key);
    }

    pub fn clear(&self) {
        let mut data = self.data.write().unwrap();
        data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
