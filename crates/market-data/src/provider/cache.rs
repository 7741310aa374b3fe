//! TTL cache for upstream responses.
//!
//! Expiry is checked when an entry is read. There is no background sweep.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

/// Cache key: provider name plus a provider-specific query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: String,
    pub query: String,
}

impl CacheKey {
    pub fn new(provider: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            query: query.into(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Thread-safe response cache with a fixed time-to-live.
#[derive(Debug)]
pub struct ResponseCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Response cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Return the cached value if it is younger than the TTL.
    ///
    /// Expired entries are removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.lock_entries();
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.lock_entries().insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock_entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(3600));
        let key = CacheKey::new("dune", "query_5745512");
        cache.insert(key.clone(), vec![1, 2, 3]);

        assert_eq!(cache.get(&key), Some(vec![1, 2, 3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_miss_and_removed() {
        let cache = ResponseCache::new(Duration::ZERO);
        let key = CacheKey::new("dune", "query_1");
        cache.insert(key.clone(), "old".to_string());
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_replaces_wholesale() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = CacheKey::new("binance", "exchange_info");
        cache.insert(key.clone(), vec!["BTCUSDT".to_string()]);
        cache.insert(key.clone(), vec!["ETHUSDT".to_string()]);

        assert_eq!(cache.get(&key), Some(vec!["ETHUSDT".to_string()]));
    }

    #[test]
    fn test_keys_are_scoped_by_provider() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert(CacheKey::new("binance", "symbols"), 1);
        cache.insert(CacheKey::new("binance-futures", "symbols"), 2);

        assert_eq!(cache.get(&CacheKey::new("binance", "symbols")), Some(1));
        assert_eq!(cache.get(&CacheKey::new("binance-futures", "symbols")), Some(2));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = CacheKey::new("dune", "query_1");
        cache.insert(key.clone(), 1);
        cache.insert(CacheKey::new("dune", "query_2"), 2);

        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
