//! Cache error types

/// Errors raised by cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("invalid checksum secret: {0}")]
    InvalidSecret(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::Backend("connection lost".to_string());
        assert_eq!(err.to_string(), "cache backend error: connection lost");

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(err.to_string().starts_with("serialization error: "));
    }
}
