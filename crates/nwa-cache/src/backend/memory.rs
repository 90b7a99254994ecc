use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use nwa_common::glob_matches;

use super::CacheBackend;
use crate::CacheError;

#[derive(Clone)]
struct Entry {
    value: Arc<Vec<u8>>,
    ttl: Duration,
    stored_at: Instant,
}

impl Entry {
    fn remaining(&self) -> Option<Duration> {
        self.ttl
            .checked_sub(self.stored_at.elapsed())
            .filter(|left| !left.is_zero())
    }
}

/// Expires each entry after its own time to live
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache with per-key expiry
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, Entry>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_capacity(100_000)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }

    /// Entry for `key` unless it has expired
    async fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.cache.get(key).await?;
        entry.remaining().map(|_| entry)
    }

    async fn insert(&self, key: &str, value: &[u8], expiry: u64) {
        let entry = Entry {
            value: Arc::new(value.to_vec()),
            ttl: Duration::from_secs(expiry),
            stored_at: Instant::now(),
        };
        self.cache.insert(key.to_string(), entry).await;
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.live(key).await.map(|entry| entry.value.to_vec()))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: &[u8], expiry: u64) -> Result<bool, CacheError> {
        self.insert(key, value, expiry).await;
        Ok(true)
    }

    async fn set_many_ex(
        &self,
        entries: &[(&str, &[u8])],
        expiry: u64,
    ) -> Result<Vec<bool>, CacheError> {
        for (key, value) in entries {
            self.insert(key, value, expiry).await;
        }
        Ok(vec![true; entries.len()])
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        Ok(self
            .live(key)
            .await
            .and_then(|entry| entry.remaining())
            .map(|left| left.as_secs_f64().ceil() as u64))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.remaining().is_some())
            .map(|(key, _)| key.as_ref().clone())
            .filter(|key| glob_matches(pattern, key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let removed = self.cache.remove(key).await;
        Ok(u64::from(removed.is_some_and(|entry| entry.remaining().is_some())))
    }

    async fn flush_db(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_exists() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("missing").await.unwrap(), None);
        assert!(!backend.exists("missing").await.unwrap());

        assert!(backend.set_ex("key", b"value", 60).await.unwrap());
        assert_eq!(backend.get("key").await.unwrap(), Some(b"value".to_vec()));
        assert!(backend.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl() {
        let backend = MemoryBackend::new();
        backend.set_ex("key", b"value", 500).await.unwrap();
        let ttl = backend.ttl("key").await.unwrap().unwrap();
        assert!(ttl <= 500 && ttl > 490);
        assert_eq!(backend.ttl("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let backend = MemoryBackend::new();
        backend.set_ex("short", b"value", 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(backend.keys("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_many() {
        let backend = MemoryBackend::new();
        let results = backend
            .set_many_ex(&[("a", b"1".as_slice()), ("b", b"2".as_slice())], 60)
            .await
            .unwrap();
        assert_eq!(results, vec![true, true]);

        let values = backend.get_many(&["a", "missing", "b"]).await.unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"2".to_vec())]);
    }

    #[tokio::test]
    async fn test_keys_delete_flush() {
        let backend = MemoryBackend::new();
        for key in ["user:1", "user:2", "group:1"] {
            backend.set_ex(key, b"x", 60).await.unwrap();
        }

        assert_eq!(backend.keys("user:*").await.unwrap(), vec!["user:1", "user:2"]);
        assert_eq!(backend.delete("user:1").await.unwrap(), 1);
        assert_eq!(backend.delete("user:1").await.unwrap(), 0);

        backend.flush_db().await.unwrap();
        assert!(backend.keys("*").await.unwrap().is_empty());
        assert!(!backend.exists("group:1").await.unwrap());
    }
}
