use super::{CacheError, CacheStore};
use crate::views::ViewData;
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Redis-backed view cache
///
/// Each view is a Redis hash. A write replaces the whole hash and sets its
/// expiry in one atomic pipeline, so readers never see a half-updated view.
pub struct RedisCache {
    client: redis::Client,
    /// Upper bound for connecting and for a single write
    timeout: Duration,
}

impl RedisCache {
    /// Create a new Redis cache
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid. No connection is made here.
    pub fn new(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CacheError::InvalidUrl(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Get an async connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        tokio::time::timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Unavailable("Redis connection timed out".to_string()))?
            .map_err(|e| CacheError::Unavailable(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_with_ttl(
        &self,
        key: &str,
        values: &ViewData,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        // HSET needs at least one field; an empty view simply stays absent
        if !values.is_empty() {
            let fields: Vec<(&str, &str)> = values
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            pipe.hset_multiple(key, fields.as_slice())
                .ignore()
                .expire(key, ttl.as_secs() as i64)
                .ignore();
        }

        tokio::time::timeout(self.timeout, pipe.query_async::<()>(&mut conn))
            .await
            .map_err(|_| CacheError::Unavailable("Redis write timed out".to_string()))?
            .map_err(|e| CacheError::Unavailable(format!("Redis write failed: {}", e)))?;

        trace!(key = %key, fields = values.len(), ttl_secs = ttl.as_secs(), "Hash written to Redis");
        Ok(())
    }
}
