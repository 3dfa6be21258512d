//! Process registry
//!
//! A process record says "a bot is running for instance X as PID Y". The bot
//! writes it on startup and deletes it on every shutdown path, so the
//! dashboard can list running bots and stop them. A bot killed without
//! running its shutdown path leaves an orphan; [`stop_instance`] reconciles
//! those by checking whether the recorded PID is still alive.

mod liveness;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

pub use liveness::{is_process_alive, send_terminate};

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row cannot be decoded
    #[error("invalid process record {id}: {reason}")]
    InvalidRecord {
        /// Record id
        id: i64,
        /// What is wrong with it
        reason: String,
    },

    /// Delivering a signal failed
    #[error("could not signal process {pid}: {reason}")]
    Signal {
        /// Target process id
        pid: u32,
        /// OS error
        reason: String,
    },
}

/// A process record that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProcessRecord {
    /// Instance the bot serves
    pub instance_id: i64,
    /// OS process id
    pub process_id: u32,
    /// Command line that started the bot
    pub command: String,
}

impl NewProcessRecord {
    /// Describe the current process
    pub fn for_current_process(instance_id: i64, command: impl Into<String>) -> Self {
        Self {
            instance_id,
            process_id: std::process::id(),
            command: command.into(),
        }
    }
}

/// A stored process record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Record id
    pub id: i64,
    /// Instance the bot serves
    pub instance_id: i64,
    /// OS process id
    pub process_id: u32,
    /// Command line that started the bot
    pub command: String,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}

/// Persisted registry of running bots
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// Store a new record
    async fn create(&self, record: NewProcessRecord) -> Result<ProcessRecord>;

    /// Delete a record. Returns whether it still existed.
    async fn delete(&self, record: &ProcessRecord) -> Result<bool>;

    /// Records for one instance, oldest first
    async fn list_for_instance(&self, instance_id: i64) -> Result<Vec<ProcessRecord>>;

    /// All records, oldest first
    async fn list_all(&self) -> Result<Vec<ProcessRecord>>;
}

/// Outcome of [`stop_instance`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// PIDs that were sent SIGTERM
    pub signalled: Vec<u32>,
    /// Orphaned records that were deleted
    pub pruned: Vec<ProcessRecord>,
}

/// Stop every bot registered for `instance_id`.
///
/// Live processes get SIGTERM and delete their own record while shutting
/// down. Records whose process is gone are deleted here.
pub async fn stop_instance(
    registry: &dyn ProcessRegistry,
    instance_id: i64,
) -> Result<StopReport> {
    let mut report = StopReport::default();

    for record in registry.list_for_instance(instance_id).await? {
        if is_process_alive(record.process_id) {
            send_terminate(record.process_id)?;
            info!(
                instance_id,
                pid = record.process_id,
                "Sent SIGTERM to the bot process"
            );
            report.signalled.push(record.process_id);
        } else {
            if !registry.delete(&record).await? {
                warn!(record_id = record.id, "Orphaned process record was already gone");
            }
            info!(
                instance_id,
                pid = record.process_id,
                "Deleted orphaned process record"
            );
            report.pruned.push(record);
        }
    }

    Ok(report)
}
