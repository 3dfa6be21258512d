//! Error types for bannerbot-core
//!
//! Each subsystem has its own error enum; `BotError` is what the dispatch
//! loop and the lifecycle controller propagate.

use thiserror::Error;

use crate::cache::{CacheError, RefreshError};
use crate::instance::InstanceError;
use crate::registry::RegistryError;
use crate::session::SessionError;

/// Core error type
#[derive(Debug, Error)]
pub enum BotError {
    /// The instance id does not resolve to a configuration
    #[error("could not find any instance with the ID `{0}`")]
    InstanceNotFound(i64),

    /// Loading the instance configuration failed
    #[error("instance error: {0}")]
    Instance(#[source] InstanceError),

    /// The remote session failed (transport or query error)
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// A view could not be computed because the session broke mid-query
    #[error("refresh error: {0}")]
    Refresh(#[from] RefreshError),

    /// Process registry error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Cache store setup error
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<InstanceError> for BotError {
    fn from(err: InstanceError) -> Self {
        match err {
            InstanceError::NotFound(id) => BotError::InstanceNotFound(id),
            other => BotError::Instance(other),
        }
    }
}

impl BotError {
    /// Whether this error happened before the bot reached its running state
    /// and is expected to end the invocation immediately.
    #[must_use]
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, BotError::InstanceNotFound(_) | BotError::Instance(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BotError>;
