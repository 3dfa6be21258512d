//! Instance configuration
//!
//! An instance is one managed TeamSpeak virtual server. Its record is owned
//! by the dashboard; the bot only reads it.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

/// Instance loading errors
#[derive(Debug, Error)]
pub enum InstanceError {
    /// No instance with this id exists
    #[error("instance not found: {0}")]
    NotFound(i64),

    /// The stored record cannot be used (e.g. an out-of-range port)
    #[error("invalid instance record {id}: {reason}")]
    InvalidRecord {
        /// Instance id
        id: i64,
        /// What is wrong with it
        reason: String,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything needed to open a ServerQuery session for one instance
#[derive(Debug)]
pub struct InstanceConfig {
    /// Database id of the instance
    pub id: i64,
    /// Display name of the virtual server
    pub virtualserver_name: String,
    /// Host name or IP address of the TeamSpeak server
    pub host: String,
    /// UDP voice port, used to select the virtual server
    pub voice_port: u16,
    /// TCP ServerQuery port
    pub serverquery_port: u16,
    /// ServerQuery login name
    pub serverquery_username: String,
    /// ServerQuery login password
    pub serverquery_password: SecretString,
    /// Nickname the bot shows while connected
    pub client_nickname: Option<String>,
}

/// Loads instance configurations by id
#[async_trait]
pub trait InstanceLoader: Send + Sync {
    /// Load the configuration for `instance_id`.
    ///
    /// Returns [`InstanceError::NotFound`] when no such instance exists.
    async fn load(&self, instance_id: i64) -> Result<InstanceConfig, InstanceError>;
}
