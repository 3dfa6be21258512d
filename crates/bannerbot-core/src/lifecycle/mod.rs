//! Bot lifecycle
//!
//! ```text
//! Starting ──load──▶ Registering ──record──▶ Running ──signal/error──▶ Stopping ──▶ Stopped
//! ```
//!
//! The controller owns the session for the whole run. A termination signal
//! only cancels a [`CancellationToken`]; the dispatch loop notices it while
//! waiting or dispatching, and teardown runs on the normal call
//! stack: the process record is deleted first, then `quit` is attempted with
//! a bounded wait, then the session is dropped.

mod signal;


use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheRefresher, CacheStore};
use crate::error::Result;
use crate::events::EventRouter;
use crate::instance::{InstanceConfig, InstanceLoader};
use crate::registry::{NewProcessRecord, ProcessRecord, ProcessRegistry};
use crate::scheduler::IdleScheduler;
use crate::session::{
    PushScope, QuerySession, SessionProvider, SessionSignal, SessionState, QUIT_COMMAND,
};
use crate::views::ViewBuilder;

pub use signal::{install_signal_listener, TerminationSignal};

/// Default bound on the `quit` request during teardown
pub const DEFAULT_QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Loading the instance configuration
    Starting,
    /// Writing the process record
    Registering,
    /// Session open, dispatch loop running
    Running,
    /// Tearing down
    Stopping,
    /// Done
    Stopped,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Registering,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Registering => write!(f, "Registering"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Everything the controller talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Instance configuration source
    pub instances: Arc<dyn InstanceLoader>,
    /// Opens the administrative session
    pub sessions: Arc<dyn SessionProvider>,
    /// Computes views
    pub views: Arc<dyn ViewBuilder>,
    /// View cache
    pub cache: Arc<dyn CacheStore>,
    /// Process registry
    pub registry: Arc<dyn ProcessRegistry>,
}

/// Controller tuning
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// How long teardown waits for the `quit` reply
    pub quit_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            quit_timeout: DEFAULT_QUIT_TIMEOUT,
        }
    }
}

/// Runs one bot for one instance from startup to teardown
pub struct LifecycleController {
    deps: Collaborators,
    options: LifecycleOptions,
    state: AtomicU8,
}

impl LifecycleController {
    /// Create a controller
    pub fn new(deps: Collaborators, options: LifecycleOptions) -> Self {
        Self {
            deps,
            options,
            state: AtomicU8::new(LifecycleState::Starting as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
        debug!(state = %state, "Lifecycle state changed");
    }

    /// Run the bot for `instance_id` until `shutdown` is cancelled or the
    /// session fails.
    ///
    /// `command` is stored in the process record. Returns `Ok(())` on a
    /// signal-triggered shutdown.
    pub async fn run(
        &self,
        instance_id: i64,
        command: &str,
        shutdown: CancellationToken,
    ) -> Result<()> {
        self.set_state(LifecycleState::Starting);
        info!(pid = std::process::id(), "My Process ID (PID) is {}.", std::process::id());

        let instance = match self.deps.instances.load(instance_id).await {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                return Err(e.into());
            }
        };

        self.set_state(LifecycleState::Registering);
        let record = self.register(&instance, command).await;

        let mut session: Option<Box<dyn QuerySession>> = None;
        let outcome = self.serve(instance, &mut session, &shutdown).await;

        self.set_state(LifecycleState::Stopping);
        match &outcome {
            Ok(()) => info!("Shutting down the bot..."),
            Err(e) => error!(error = %e, "Bot stopped with an error"),
        }
        self.teardown(record, session).await;
        self.set_state(LifecycleState::Stopped);

        outcome
    }

    async fn register(&self, instance: &InstanceConfig, command: &str) -> Option<ProcessRecord> {
        match self.deps.registry.list_for_instance(instance.id).await {
            Ok(existing) if !existing.is_empty() => {
                let pids: Vec<u32> = existing.iter().map(|r| r.process_id).collect();
                warn!(
                    instance_id = instance.id,
                    pids = ?pids,
                    "Another bot is already registered for this instance"
                );
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Could not list existing process records"),
        }

        let record = NewProcessRecord::for_current_process(instance.id, command);
        match self.deps.registry.create(record).await {
            Ok(record) => {
                debug!(record_id = record.id, pid = record.process_id, "Process registered");
                Some(record)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to save the process ID to the database, so that it can be stopped later by the UI."
                );
                None
            }
        }
    }

    async fn serve(
        &self,
        instance: Arc<InstanceConfig>,
        slot: &mut Option<Box<dyn QuerySession>>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        self.set_state(LifecycleState::Running);
        info!(
            host = %instance.host,
            port = instance.serverquery_port,
            "Connecting to the TeamSpeak server..."
        );

        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before the session was established");
                return Ok(());
            }
            opened = self.deps.sessions.open(&instance) => opened?,
        };
        let session = slot.insert(opened);
        info!(
            virtualserver = %instance.virtualserver_name,
            "Connected to the virtual server."
        );

        let refresher = CacheRefresher::new(
            instance.clone(),
            self.deps.views.clone(),
            self.deps.cache.clone(),
        );
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            refreshed = refresher.refresh_all(&mut **session) => refreshed?,
        }

        session.register_push_scope(PushScope::Server).await?;
        info!("Waiting for events...");

        let mut scheduler = IdleScheduler::new();
        let router = EventRouter::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let signal = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                signal = session.wait() => signal?,
            };

            let dispatch = async {
                match signal {
                    SessionSignal::IdleTick(idle_seconds) => scheduler
                        .on_idle_tick(idle_seconds, &mut **session, &refresher)
                        .await
                        .map(drop),
                    SessionSignal::Event(event) => {
                        scheduler.note_activity();
                        router.on_event(&event, &mut **session, &refresher).await
                    }
                }
            };

            // A stalled request must not hold up shutdown
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                dispatched = dispatch => dispatched?,
            }
        }

        Ok(())
    }

    async fn teardown(&self, record: Option<ProcessRecord>, session: Option<Box<dyn QuerySession>>) {
        if let Some(record) = record {
            match self.deps.registry.delete(&record).await {
                Ok(true) => debug!(record_id = record.id, "Process record deleted"),
                Ok(false) => warn!(record_id = record.id, "Process record was already deleted"),
                Err(e) => warn!(
                    error = %e,
                    "Failed to delete the process ID from the database."
                ),
            }
        }

        if let Some(mut session) = session {
            if session.state() == SessionState::Active {
                info!("Disconnecting from the server...");
                match tokio::time::timeout(self.options.quit_timeout, session.request(QUIT_COMMAND))
                    .await
                {
                    Ok(Ok(_)) => debug!("Session closed"),
                    Ok(Err(e)) => warn!(error = %e, "Quit request failed"),
                    Err(_) => warn!(
                        timeout_secs = self.options.quit_timeout.as_secs(),
                        "Quit request timed out"
                    ),
                }
            } else {
                debug!(state = %session.state(), "Session is not active, skipping quit");
            }
            drop(session);
        }

        info!("Bot stopped.");
    }
}
