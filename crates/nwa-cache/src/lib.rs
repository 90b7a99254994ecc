//! NWA Cache - key-value caching
//!
//! - `backend`: the [`CacheBackend`] trait with Redis and in-memory stores
//! - `signed`: values stored together with an HMAC checksum
//! - `object_cache`: plain object storage and result memoization
//! - `key`: cache key construction from call arguments

pub mod backend;
pub mod error;
pub mod key;
pub mod object_cache;
pub mod signed;

pub use backend::{CacheBackend, CachePool, MemoryBackend, RedisBackend, create_pool};
pub use error::CacheError;
pub use key::CacheKey;
pub use object_cache::{cached_result, flush_all, flush_selected, read_object, write_object};
pub use signed::{SignedCache, get_signed_cache_value, hmac_checksum, set_signed_cache_value};
