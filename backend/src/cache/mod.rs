//! Load cache - reuse a loaded dataset for a bounded time.
//!
//! Keyed by workbook. Only successful loads are stored, so a failed load is
//! retried on the next request instead of being remembered.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default time a loaded dataset stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A cached value with its bookkeeping
#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    stored_at: Instant,
    /// Number of times served from cache
    hits: u32,
}

/// TTL cache for whole-load results
#[derive(Debug)]
pub struct LoadCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> LoadCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.get_at(key, Instant::now())
    }

    /// Same as [`LoadCache::get`] with an explicit clock.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Arc<T>> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) >= self.ttl,
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        Some(Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: &str, value: T) -> Arc<T> {
        self.insert_at(key, value, Instant::now())
    }

    pub fn insert_at(&self, key: &str, value: T, now: Instant) -> Arc<T> {
        let value = Arc::new(value);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                CacheEntry {
                    value: Arc::clone(&value),
                    stored_at: now,
                    hits: 0,
                },
            );
        }
        value
    }

    /// Drop `key`. Called after every save so the next read sees the write.
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Times `key` was served from cache since it was stored.
    pub fn hits(&self, key: &str) -> u32 {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).map(|e| e.hits))
            .unwrap_or(0)
    }

    /// Cached value, or the result of `load`. Errors are returned as is and
    /// never stored.
    pub async fn get_or_try_load<E, F, Fut>(&self, key: &str, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "load cache hit");
            return Ok(value);
        }
        tracing::debug!(key, "load cache miss");
        let value = load().await?;
        Ok(self.insert(key, value))
    }
}

impl<T> Default for LoadCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = LoadCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("wb", 1, t0);

        assert_eq!(cache.get_at("wb", t0 + Duration::from_secs(59)).as_deref(), Some(&1));
        assert!(cache.get_at("wb", t0 + Duration::from_secs(60)).is_none());
        // Expired entries are evicted
        assert!(cache.get_at("wb", t0).is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = LoadCache::default();
        cache.insert("wb", "data".to_string());
        cache.invalidate("wb");
        assert!(cache.get("wb").is_none());
    }

    #[test]
    fn test_hits_counted() {
        let cache = LoadCache::default();
        cache.insert("wb", 7);
        cache.get("wb");
        cache.get("wb");
        assert_eq!(cache.hits("wb"), 2);
        assert_eq!(cache.hits("other"), 0);
    }

    #[tokio::test]
    async fn test_failed_load_not_cached() {
        let cache: LoadCache<u32> = LoadCache::default();
        let err = cache
            .get_or_try_load("wb", || async { Err::<u32, String>("unreachable".into()) })
            .await;
        assert!(err.is_err());
        assert!(cache.get("wb").is_none());

        let value = cache.get_or_try_load("wb", || async { Ok::<u32, String>(5) }).await.unwrap();
        assert_eq!(*value, 5);

        // Second call is served from cache
        let value = cache
            .get_or_try_load("wb", || async { Err::<u32, String>("not called".into()) })
            .await
            .unwrap();
        assert_eq!(*value, 5);
    }
}
