//! View caching
//!
//! `CacheRefresher` computes a view through the [`ViewBuilder`] and writes it
//! to the [`CacheStore`] under the instance-scoped key with the view's TTL.
//!
//! Cache writes are best-effort: when the store is unreachable the write is
//! dropped and the next scheduled or event-driven refresh writes again.
//! A failure while computing the view means the session itself is broken and
//! is returned to the caller.

mod redis_store;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::instance::InstanceConfig;
use crate::session::{QuerySession, SessionError};
use crate::views::{View, ViewBuilder, ViewData};

pub use redis_store::RedisCache;

/// Cache store errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached or rejected the write
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The store URL is malformed
    #[error("invalid cache url: {0}")]
    InvalidUrl(String),
}

/// A TTL-based key/value store for views
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Replace the mapping under `key` and expire it after `ttl`
    async fn set_with_ttl(
        &self,
        key: &str,
        values: &ViewData,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

/// Refresh errors
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The view could not be computed
    #[error("failed to build the {view} view: {source}")]
    View {
        /// Which view
        view: View,
        /// Session failure underneath
        #[source]
        source: SessionError,
    },
}

/// Computes views and writes them to the cache
pub struct CacheRefresher {
    instance: Arc<InstanceConfig>,
    views: Arc<dyn ViewBuilder>,
    cache: Arc<dyn CacheStore>,
}

impl CacheRefresher {
    /// Create a refresher for one instance
    pub fn new(
        instance: Arc<InstanceConfig>,
        views: Arc<dyn ViewBuilder>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            instance,
            views,
            cache,
        }
    }

    /// Recompute one view and overwrite its cache entry
    pub async fn refresh(
        &self,
        view: View,
        session: &mut dyn QuerySession,
    ) -> Result<(), RefreshError> {
        debug!(instance_id = self.instance.id, view = %view, "Caching the current {}...", view);

        let data = self
            .views
            .build(view, session, &self.instance)
            .await
            .map_err(|source| RefreshError::View { view, source })?;

        let key = view.cache_key(self.instance.id);
        match self.cache.set_with_ttl(&key, &data, view.ttl()).await {
            Ok(()) => {
                debug!(key = %key, entries = data.len(), ttl_secs = view.ttl().as_secs(), "View cached");
            }
            Err(e) => {
                // The next refresh writes again
                debug!(key = %key, error = %e, "Cache write skipped");
            }
        }
        Ok(())
    }

    /// Refresh several views in order
    pub async fn refresh_many(
        &self,
        views: &[View],
        session: &mut dyn QuerySession,
    ) -> Result<(), RefreshError> {
        for view in views {
            self.refresh(*view, session).await?;
        }
        Ok(())
    }

    /// Refresh all four views
    pub async fn refresh_all(&self, session: &mut dyn QuerySession) -> Result<(), RefreshError> {
        self.refresh_many(&View::ALL, session).await
    }
}
