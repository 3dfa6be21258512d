//! Bannerbot Core - per-instance cache refresh engine
//!
//! This crate drives the long-running bot process that keeps banner data
//! fresh for one TeamSpeak instance:
//! - Session: the administrative ServerQuery connection and its wait primitive
//! - Scheduler: idle-tick cadences (datetime, server data, keepalive)
//! - Events: membership-change notifications mapped to refreshes
//! - Cache: view computation and TTL-bounded cache writes
//! - Registry: the persisted process record used to stop a bot later
//! - Lifecycle: startup, the dispatch loop and ordered teardown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod events;
pub mod instance;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheError, CacheRefresher, CacheStore, RedisCache, RefreshError};
pub use error::{BotError, Result};
pub use events::EventRouter;
pub use instance::{InstanceConfig, InstanceError, InstanceLoader};
pub use lifecycle::{
    install_signal_listener, Collaborators, LifecycleController, LifecycleOptions, LifecycleState,
    TerminationSignal,
};
pub use registry::{
    is_process_alive, stop_instance, NewProcessRecord, ProcessRecord, ProcessRegistry,
    RegistryError, StopReport,
};
pub use scheduler::{Cadence, IdleScheduler, TickAction};
pub use session::{
    EventKind, LeaveReason, PushScope, QuerySession, Reply, ServerEvent, SessionError,
    SessionProvider, SessionSignal, SessionState,
};
pub use session::serverquery::{ServerQueryProvider, SessionSettings};
pub use store::Database;
pub use views::{ServerQueryViews, View, ViewBuilder, ViewData};
