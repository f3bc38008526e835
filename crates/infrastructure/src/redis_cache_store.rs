//! Redis-backed cache store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use vitrine_application::{CacheStats, CacheStore};
use vitrine_core::{AppError, AppResult};

const SCAN_BATCH_SIZE: u32 = 200;

/// Redis implementation of the cache store port.
///
/// Pattern deletion walks the keyspace with `SCAN MATCH` and deletes each
/// page with `DEL`.
pub struct RedisCacheStore {
    client: redis::Client,
    key_prefix: String,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisCacheStore {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        let value: Option<String> = connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to read cache entry '{key}': {error}"))
        })?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut connection = self.connection().await?;

        connection
            .set_ex(self.key_for(key), value, ttl_seconds)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write cache entry '{key}': {error}"))
            })
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let deleted: u64 = connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to delete cache entry '{key}': {error}"))
        })?;

        Ok(deleted > 0)
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        let namespaced_pattern = self.key_for(pattern);
        let mut cursor: u64 = 0;
        let mut deleted_total: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&namespaced_pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to scan cache keys matching '{pattern}': {error}"
                    ))
                })?;

            if !keys.is_empty() {
                let deleted: u64 = connection.del(keys).await.map_err(|error| {
                    AppError::Internal(format!(
                        "failed to delete cache keys matching '{pattern}': {error}"
                    ))
                })?;
                deleted_total += deleted;
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(deleted_total > 0)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
