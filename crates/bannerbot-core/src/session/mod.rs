//! Administrative sessions to a remote voice server
//!
//! A session is opened once per bot process and owned by the lifecycle
//! controller. Everything the bot does to the remote side goes through the
//! [`QuerySession`] trait:
//!
//! - `request` sends one command and returns its reply records
//! - `wait` blocks until one second of silence (an idle tick) or one pushed
//!   event, and returns exactly one of them
//! - `last_activity` reports when the bot last sent a request, which drives
//!   the keepalive rule
//!
//! ```text
//! Disconnected ──open──▶ Connecting ──login──▶ Active ──quit──▶ Closing ──▶ Closed
//!                                                 │
//!                                                 └── transport error ──▶ Closed
//! ```

pub mod event;
mod idle;
pub mod serverquery;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::instance::InstanceConfig;

pub use event::{EventKind, LeaveReason, ServerEvent};
pub use idle::IdleCounter;

/// Command that keeps the session alive without changing anything
pub const KEEPALIVE_COMMAND: &str = "clientupdate";

/// Command that closes the remote side of the session
pub const QUIT_COMMAND: &str = "quit";

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection could not be established or was lost
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected a command (including failed authentication)
    #[error("query command failed: {message} (error #{code})")]
    Protocol {
        /// ServerQuery error id
        code: u32,
        /// ServerQuery error message
        message: String,
    },

    /// No reply arrived within the request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The session is not in a state that accepts requests
    #[error("session is {0}")]
    NotActive(SessionState),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

/// Session connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected yet
    Disconnected,
    /// Transport is up, handshake in progress
    Connecting,
    /// Authenticated and usable
    Active,
    /// Quit was sent
    Closing,
    /// Transport released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One reply record: flat key/value pairs
pub type Record = BTreeMap<String, String>;

/// Reply to a single request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    records: Vec<Record>,
}

impl Reply {
    /// Create a reply from its records
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// All records of the reply
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The first record, for single-record commands like `serverinfo`
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Whether the reply carried no data
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which pushed events the session subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushScope {
    /// Server-wide events: clients entering and leaving the server
    Server,
    /// Events of a single channel
    Channel(u64),
}

/// What a single `wait` call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Another second passed without pushed traffic; carries the number of
    /// consecutive idle seconds since the last event
    IdleTick(u64),
    /// The server pushed an event
    Event(ServerEvent),
}

/// A live administrative session
#[async_trait]
pub trait QuerySession: Send {
    /// Current connection state
    fn state(&self) -> SessionState;

    /// When the bot last sent a request on this session
    fn last_activity(&self) -> DateTime<Utc>;

    /// Send one command and wait for its reply
    async fn request(&mut self, command: &str) -> Result<Reply>;

    /// Subscribe to pushed events of `scope`
    async fn register_push_scope(&mut self, scope: PushScope) -> Result<()>;

    /// Block until the next idle tick or pushed event and return it
    async fn wait(&mut self) -> Result<SessionSignal>;
}

/// Opens sessions for instances
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connect and authenticate. Fails fast, without retries.
    async fn open(&self, instance: &InstanceConfig) -> Result<Box<dyn QuerySession>>;
}
