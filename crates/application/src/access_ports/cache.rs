use async_trait::async_trait;
use vitrine_core::AppResult;

/// Hit and miss counters reported by a cache store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing or an expired entry.
    pub misses: u64,
}

/// Best-effort key/value cache shared by every operation.
///
/// Keys are relative to the store namespace. Patterns use `*` and `?` globs.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the encoded value stored under `key`.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores an encoded value for `ttl_seconds`; zero disables caching.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()>;

    /// Deletes one key and reports whether it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Deletes every key matching `pattern` and reports whether any existed.
    async fn delete_matching(&self, pattern: &str) -> AppResult<bool>;

    /// Returns hit and miss counters.
    fn stats(&self) -> CacheStats;
}
