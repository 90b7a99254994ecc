//! Cache storage backends
//!
//! The [`CacheBackend`] trait is the seam between the cache helpers and the
//! store. [`RedisBackend`] talks to a Redis server, [`MemoryBackend`] keeps
//! everything in process and is meant for tests and single instance setups.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use nwa_common::{ApiError, format_error};

use crate::CacheError;

pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;

/// Shared handle to a cache backend
pub type CachePool = Arc<dyn CacheBackend>;

/// Key-value store with per-key expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Get several keys in one round trip
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Store `value` under `key` for `expiry` seconds. Returns whether the
    /// value was stored.
    async fn set_ex(&self, key: &str, value: &[u8], expiry: u64) -> Result<bool, CacheError>;

    /// Store several values atomically, all with the same expiry. Returns the
    /// per-entry outcome in input order.
    async fn set_many_ex(
        &self,
        entries: &[(&str, &[u8])],
        expiry: u64,
    ) -> Result<Vec<bool>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining time to live in seconds, `None` when the key does not exist
    /// or never expires
    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError>;

    /// Keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete a key, returning the number of removed keys
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    /// Remove every key of the current database
    async fn flush_db(&self) -> Result<(), CacheError>;
}

/// Connect to Redis at `url` and check that it answers.
///
/// Failures are logged with a correlation key and returned as a 500
/// [`ApiError`].
pub async fn create_pool(url: &str) -> Result<CachePool, ApiError> {
    match RedisBackend::connect(url).await {
        Ok(backend) => {
            tracing::info!("Cache pool created");
            Ok(Arc::new(backend))
        }
        Err(e) => {
            let (key, formatted) = format_error(&e, None);
            tracing::error!(error_key = %key, "{}", formatted);
            Err(ApiError::new(
                500,
                key,
                format!("Cache not available due to: {}", e),
            ))
        }
    }
}
