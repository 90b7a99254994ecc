//! Signed cache values
//!
//! Every value is stored next to an HMAC-SHA512 checksum under
//! `<key>-checksum`. A value whose checksum does not verify is treated as
//! absent, so a compromised cache cannot feed forged data to the service.

use std::future::Future;

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha512;

use crate::backend::{CacheBackend, CachePool};
use crate::{CacheError, CacheKey};

type HmacSha512 = Hmac<Sha512>;

/// Default expiry of signed values in seconds
pub const DEFAULT_SIGNED_EXPIRY: u64 = 120;

fn checksum_key(key: &str) -> String {
    format!("{}-checksum", key)
}

fn mac(secret: &str, message: &[u8]) -> Result<HmacSha512, CacheError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| CacheError::InvalidSecret(e.to_string()))?;
    mac.update(message);
    Ok(mac)
}

/// Lowercase hex HMAC-SHA512 of `message`
pub fn hmac_checksum(secret: &str, message: &[u8]) -> Result<String, CacheError> {
    Ok(const_hex::encode(mac(secret, message)?.finalize().into_bytes()))
}

/// Store `value` and its checksum, both expiring after `expiry` seconds.
pub async fn set_signed_cache_value<P, T>(
    pool: &P,
    secret: &str,
    cache_key: &str,
    value: &T,
    expiry: u64,
) -> Result<(), CacheError>
where
    P: CacheBackend + ?Sized,
    T: Serialize + ?Sized,
{
    let serialized = serde_json::to_vec(value)?;
    let checksum = hmac_checksum(secret, &serialized)?;
    let checksum_key = checksum_key(cache_key);

    let results = pool
        .set_many_ex(
            &[
                (cache_key, serialized.as_slice()),
                (checksum_key.as_str(), checksum.as_bytes()),
            ],
            expiry,
        )
        .await?;

    let value_ok = results.first().copied().unwrap_or(false);
    let checksum_ok = results.get(1).copied().unwrap_or(false);
    if !value_ok || !checksum_ok {
        tracing::warn!(cache_key, value_ok, checksum_ok, "Cache not set");
    }
    Ok(())
}

/// Fetch a signed value.
///
/// Returns `None` when the value or its checksum is missing, or when the
/// checksum does not match.
pub async fn get_signed_cache_value<P, T>(
    pool: &P,
    secret: &str,
    cache_key: &str,
) -> Result<Option<T>, CacheError>
where
    P: CacheBackend + ?Sized,
    T: DeserializeOwned,
{
    let checksum_key = checksum_key(cache_key);
    let mut values = pool
        .get_many(&[cache_key, checksum_key.as_str()])
        .await?
        .into_iter();

    let (Some(Some(serialized)), Some(Some(stored_checksum))) = (values.next(), values.next())
    else {
        return Ok(None);
    };
    if serialized.is_empty() || stored_checksum.is_empty() {
        return Ok(None);
    }

    let mac = mac(secret, &serialized)?;
    let verified = const_hex::decode(&stored_checksum)
        .ok()
        .is_some_and(|expected| mac.clone().verify_slice(&expected).is_ok());
    if !verified {
        tracing::error!(
            cache_key,
            correct_checksum = %String::from_utf8_lossy(&stored_checksum),
            recalculated_checksum = %const_hex::encode(mac.finalize().into_bytes()),
            "Checksum for cache was wrong, someone tampered with the values!"
        );
        return Ok(None);
    }

    Ok(Some(serde_json::from_slice(&serialized)?))
}

/// Memoizes async call results in the cache as signed values.
///
/// ```no_run
/// # async fn example(pool: nwa_cache::CachePool) -> Result<(), nwa_cache::CacheError> {
/// use nwa_cache::{CacheKey, SignedCache};
///
/// let cache = SignedCache::new(pool, "my_app", "SECRET_KEY_FOR_HMAC_CHECKSUM");
/// let user: String = cache
///     .cached_result(&CacheKey::new("get_user").arg(42), || async { "alice".to_string() })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SignedCache {
    pool: CachePool,
    prefix: String,
    secret: String,
    key_name: Option<String>,
    expiry: u64,
}

impl SignedCache {
    pub fn new(pool: CachePool, prefix: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            secret: secret.into(),
            key_name: None,
            expiry: DEFAULT_SIGNED_EXPIRY,
        }
    }

    /// Use the fixed key `<prefix>:<key_name>` regardless of the arguments
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Expiry in seconds
    pub fn expiry(mut self, expiry: u64) -> Self {
        self.expiry = expiry;
        self
    }

    /// Cache key for a call: `<prefix>:<key_name>` when a key name is set,
    /// otherwise the prefix followed by the call arguments.
    pub fn cache_key(&self, call: &CacheKey) -> String {
        match &self.key_name {
            Some(key_name) => format!("{}:{}", self.prefix, key_name),
            None => call.renamed(self.prefix.clone()).render(),
        }
    }

    /// Serve the call result from the cache, or run `call` and store its result
    pub async fn cached_result<T, F, Fut>(&self, call: &CacheKey, f: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cache_key = self.cache_key(call);
        tracing::debug!(cache_key = %cache_key, function = call.name(), "Cache called with wrapper func");

        if let Some(cached) =
            get_signed_cache_value(self.pool.as_ref(), &self.secret, &cache_key).await?
        {
            tracing::info!(cache_key = %cache_key, "Cache contains key, serving from cache");
            return Ok(cached);
        }

        tracing::info!(cache_key = %cache_key, "Cache doesn't contain key, calling real function");
        let result = f().await;
        set_signed_cache_value(self.pool.as_ref(), &self.secret, &cache_key, &result, self.expiry)
            .await?;
        Ok(result)
    }

    /// Like [`cached_result`](Self::cached_result) for fallible calls; only
    /// successful results are stored.
    pub async fn try_cached_result<T, E, F, Fut>(&self, call: &CacheKey, f: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache_key = self.cache_key(call);
        if let Some(cached) =
            get_signed_cache_value(self.pool.as_ref(), &self.secret, &cache_key).await?
        {
            tracing::info!(cache_key = %cache_key, "Cache contains key, serving from cache");
            return Ok(cached);
        }

        tracing::info!(cache_key = %cache_key, "Cache doesn't contain key, calling real function");
        let result = f().await?;
        set_signed_cache_value(self.pool.as_ref(), &self.secret, &cache_key, &result, self.expiry)
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "SECRET_KEY_FOR_HMAC_CHECKSUM";

    #[test]
    fn test_hmac_checksum() {
        let checksum = hmac_checksum("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            checksum,
            "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb\
             82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a"
        );
        assert_eq!(checksum.len(), 128);

        // Keys of any length are accepted, longer ones are hashed first
        assert_eq!(hmac_checksum("", b"").unwrap().len(), 128);
        assert_eq!(hmac_checksum(&"k".repeat(1024), b"message").unwrap().len(), 128);
    }

    #[tokio::test]
    async fn test_stored_checksum_matches_hmac() {
        let pool = MemoryBackend::new();
        set_signed_cache_value(&pool, "", "k", &1u32, 60).await.unwrap();

        let stored = pool.get("k-checksum").await.unwrap().unwrap();
        assert_eq!(stored, hmac_checksum("", b"1").unwrap().into_bytes());
        let value: Option<u32> = get_signed_cache_value(&pool, "", "k").await.unwrap();
        assert_eq!(value, Some(1));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let pool = MemoryBackend::new();
        set_signed_cache_value(&pool, SECRET, "k", &("a", 2, 3.0), 300)
            .await
            .unwrap();

        assert!(pool.exists("k").await.unwrap());
        assert!(pool.exists("k-checksum").await.unwrap());
        assert!(pool.ttl("k").await.unwrap().unwrap() <= 300);

        let value: Option<(String, i32, f64)> =
            get_signed_cache_value(&pool, SECRET, "k").await.unwrap();
        assert_eq!(value, Some(("a".to_string(), 2, 3.0)));
    }

    #[tokio::test]
    async fn test_missing_parts() {
        let pool = MemoryBackend::new();
        let value: Option<u32> = get_signed_cache_value(&pool, SECRET, "absent").await.unwrap();
        assert_eq!(value, None);

        pool.set_ex("only-value", b"1", 60).await.unwrap();
        let value: Option<u32> = get_signed_cache_value(&pool, SECRET, "only-value")
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_tampered_value() {
        let pool = MemoryBackend::new();
        set_signed_cache_value(&pool, SECRET, "k", &1u32, 60).await.unwrap();
        pool.set_ex("k", b"2", 60).await.unwrap();

        let value: Option<u32> = get_signed_cache_value(&pool, SECRET, "k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let pool = MemoryBackend::new();
        set_signed_cache_value(&pool, SECRET, "k", &1u32, 60).await.unwrap();

        let value: Option<u32> = get_signed_cache_value(&pool, "other", "k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_cached_result_calls_once() {
        let pool: CachePool = Arc::new(MemoryBackend::new());
        let cache = SignedCache::new(pool.clone(), "my_app", SECRET);
        let calls = AtomicUsize::new(0);

        let key = CacheKey::new("get_thing").arg("id1");
        for _ in 0..3 {
            let value: Vec<u32> = cache
                .cached_result(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    vec![1, 2, 3]
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pool.exists("my_app:id1").await.unwrap());
        assert!(pool.ttl("my_app:id1").await.unwrap().unwrap() <= DEFAULT_SIGNED_EXPIRY);
    }

    #[tokio::test]
    async fn test_cached_result_key_name() {
        let pool: CachePool = Arc::new(MemoryBackend::new());
        let cache = SignedCache::new(pool.clone(), "my_app", SECRET)
            .key_name("all_things")
            .expiry(30);

        let _: u32 = cache
            .cached_result(&CacheKey::new("f").arg("ignored"), || async { 5 })
            .await
            .unwrap();
        assert!(pool.exists("my_app:all_things").await.unwrap());
        assert!(pool.ttl("my_app:all_things").await.unwrap().unwrap() <= 30);
    }

    #[derive(Debug, PartialEq)]
    enum CallError {
        Boom,
        Cache(String),
    }

    impl From<CacheError> for CallError {
        fn from(err: CacheError) -> Self {
            CallError::Cache(err.to_string())
        }
    }

    #[tokio::test]
    async fn test_try_cached_result_skips_errors() {
        let pool: CachePool = Arc::new(MemoryBackend::new());
        let cache = SignedCache::new(pool.clone(), "my_app", SECRET);
        let key = CacheKey::new("f").arg(1);

        let failed: Result<u32, CallError> = cache
            .try_cached_result(&key, || async { Err(CallError::Boom) })
            .await;
        assert_eq!(failed, Err(CallError::Boom));
        assert!(!pool.exists("my_app:1").await.unwrap());

        let ok: Result<u32, CallError> = cache.try_cached_result(&key, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        assert!(pool.exists("my_app:1").await.unwrap());
    }
}
