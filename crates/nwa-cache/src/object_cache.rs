//! Plain object cache
//!
//! Values are stored as JSON without a checksum. Reads can be bypassed per
//! request with the `nwa-stdlib-no-cache` header, see
//! [`nwa_common::NO_CACHE_HEADER`].

use std::future::Future;

use nwa_common::{ApiError, format_error};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::CacheBackend;
use crate::{CacheError, CacheKey};

/// Default expiry of cached objects in seconds
pub const DEFAULT_OBJECT_EXPIRY: u64 = 7200;

/// Store `value` under `key` for `expiry` seconds. Returns whether it was
/// stored.
pub async fn write_object<P, T>(
    pool: &P,
    key: &str,
    value: &T,
    expiry: u64,
) -> Result<bool, CacheError>
where
    P: CacheBackend + ?Sized,
    T: Serialize + ?Sized,
{
    let serialized = serde_json::to_vec(value)?;
    let stored = pool.set_ex(key, &serialized, expiry).await?;
    if !stored {
        tracing::warn!(cache_key = key, "Nothing to set");
    }
    Ok(stored)
}

/// Read the object stored under `key`. Always a miss when `no_cache` is set.
pub async fn read_object<P, T>(pool: &P, key: &str, no_cache: bool) -> Result<Option<T>, CacheError>
where
    P: CacheBackend + ?Sized,
    T: DeserializeOwned,
{
    if no_cache {
        tracing::debug!(cache_key = key, "Cache bypassed on request");
        return Ok(None);
    }
    match pool.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

/// Serve the call result from the cache, or run `f` and store its result.
///
/// The key is the rendered [`CacheKey`]: its name (a function name or an
/// explicit prefix) followed by the scalar call arguments.
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use nwa_cache::{CacheKey, MemoryBackend, cached_result};
///
/// let pool = MemoryBackend::new();
/// let key = CacheKey::new("test_func").arg("myid");
/// let value: (String, i32) = cached_result(&pool, &key, 500, false, || async {
///     ("b".to_string(), 4)
/// })
/// .await
/// .unwrap();
/// assert_eq!(value.1, 4);
/// # });
/// ```
pub async fn cached_result<P, T, F, Fut>(
    pool: &P,
    key: &CacheKey,
    expiry: u64,
    no_cache: bool,
    f: F,
) -> Result<T, CacheError>
where
    P: CacheBackend + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let cache_key = key.render();
    if let Some(cached) = read_object(pool, &cache_key, no_cache).await? {
        tracing::debug!(cache_key = %cache_key, "Serving from cache");
        return Ok(cached);
    }

    let result = f().await;
    write_object(pool, &cache_key, &result, expiry).await?;
    Ok(result)
}

/// Remove every key of the cache
pub async fn flush_all<P>(pool: &P) -> Result<String, ApiError>
where
    P: CacheBackend + ?Sized,
{
    match pool.flush_db().await {
        Ok(()) => Ok("Successfully flushed the whole cache".to_string()),
        Err(e) => {
            let (key, formatted) = format_error(&e, None);
            tracing::error!(error_key = %key, "{}", formatted);
            Err(ApiError::new(
                500,
                key,
                format!("Problem while flushing the cache: {}", e),
            ))
        }
    }
}

/// Remove every key matching the glob `pattern`.
///
/// Reports a 400 when one of the deletes removed nothing, e.g. because the
/// key expired in between.
pub async fn flush_selected<P>(pool: &P, pattern: &str) -> Result<String, ApiError>
where
    P: CacheBackend + ?Sized,
{
    let outcome: Result<Vec<u64>, CacheError> = async {
        let keys = pool.keys(pattern).await?;
        let mut removed = Vec::with_capacity(keys.len());
        for key in &keys {
            removed.push(pool.delete(key).await?);
        }
        Ok(removed)
    }
    .await;

    match outcome {
        Ok(removed) if removed.contains(&0) => Err(ApiError::new(
            400,
            "Some Deletions not done",
            "Some Deletions not done",
        )),
        Ok(removed) => {
            tracing::info!(pattern, deleted = removed.len(), "Flushed selected cache keys");
            Ok(format!("Delete of keys for: {} completely successful", pattern))
        }
        Err(e) => {
            let (key, formatted) = format_error(&e, None);
            tracing::error!(error_key = %key, "{}", formatted);
            Err(ApiError::new(500, key, format!("Flush unsuccessful: {}", e)))
        }
    }
}
