//! Idle-tick scheduler
//!
//! The session reports one idle tick per second without pushed traffic,
//! carrying the consecutive idle seconds. Four independent rules run on it:
//!
//! | Rule | Trigger | Effect |
//! |---|---|---|
//! | idle log | every 30 idle seconds | debug log line |
//! | keepalive | last request older than 260s | `clientupdate` |
//! | datetime | every 15 idle seconds | datetime refresh |
//! | server data | every 60 idle seconds | servergroup list + virtualserver info refresh |
//!
//! The keepalive threshold sits below the server's 300s query timeout.
//! Each periodic rule is a [`Cadence`] with its own last-fired mark; rules
//! co-fire freely.


use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::CacheRefresher;
use crate::error::Result;
use crate::session::{QuerySession, KEEPALIVE_COMMAND};
use crate::views::View;

/// Idle seconds between idle log lines
pub const IDLE_LOG_INTERVAL_SECS: u64 = 30;

/// Idle seconds between datetime refreshes
pub const DATETIME_REFRESH_SECS: u64 = 15;

/// Idle seconds between servergroup/virtualserver refreshes
pub const SERVER_REFRESH_SECS: u64 = 60;

/// Maximum age of the last request before a keepalive is sent
pub const KEEPALIVE_THRESHOLD_SECS: i64 = 260;

/// Something a tick asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Log the idle duration
    LogIdle(u64),
    /// Send a keepalive request
    Keepalive,
    /// Refresh a view
    Refresh(View),
}

/// A periodic rule over the idle-second count.
///
/// Fires when the count reaches the next multiple of `every` past the last
/// firing. For consecutive counts that is exactly `n % every == 0`; when a
/// count is skipped the rule fires once on the first count past the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
    last_fired: u64,
}

impl Cadence {
    /// A cadence firing every `every` idle seconds
    pub fn every(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_fired: 0,
        }
    }

    /// Forget the last firing (the idle count was reset)
    pub fn reset(&mut self) {
        self.last_fired = 0;
    }

    /// Whether the rule fires at `idle` seconds. Records the firing.
    pub fn is_due(&mut self, idle: u64) -> bool {
        if idle < self.last_fired {
            self.last_fired = 0;
        }
        if idle == 0 || idle - self.last_fired < self.every {
            return false;
        }
        self.last_fired = idle - idle % self.every;
        true
    }
}

/// Turns idle ticks into log lines, keepalives and view refreshes
#[derive(Debug, Clone)]
pub struct IdleScheduler {
    idle_log: Cadence,
    datetime: Cadence,
    server: Cadence,
    keepalive_threshold: chrono::Duration,
}

impl IdleScheduler {
    /// Create a scheduler with the standard intervals
    pub fn new() -> Self {
        Self {
            idle_log: Cadence::every(IDLE_LOG_INTERVAL_SECS),
            datetime: Cadence::every(DATETIME_REFRESH_SECS),
            server: Cadence::every(SERVER_REFRESH_SECS),
            keepalive_threshold: chrono::Duration::seconds(KEEPALIVE_THRESHOLD_SECS),
        }
    }

    /// Pushed traffic was observed; the idle count starts over
    pub fn note_activity(&mut self) {
        self.idle_log.reset();
        self.datetime.reset();
        self.server.reset();
    }

    /// Decide what a tick at `idle_seconds` does.
    ///
    /// Actions come back in execution order: log, keepalive, datetime,
    /// servergroup list, virtualserver info.
    pub fn plan(
        &mut self,
        idle_seconds: u64,
        last_activity: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<TickAction> {
        let mut actions = Vec::new();

        if self.idle_log.is_due(idle_seconds) {
            actions.push(TickAction::LogIdle(idle_seconds));
        }
        if last_activity < now - self.keepalive_threshold {
            actions.push(TickAction::Keepalive);
        }
        if self.datetime.is_due(idle_seconds) {
            actions.push(TickAction::Refresh(View::Datetime));
        }
        if self.server.is_due(idle_seconds) {
            actions.push(TickAction::Refresh(View::ServergroupList));
            actions.push(TickAction::Refresh(View::VirtualserverInfo));
        }

        actions
    }

    /// Handle one idle tick against the live session
    pub async fn on_idle_tick(
        &mut self,
        idle_seconds: u64,
        session: &mut dyn QuerySession,
        refresher: &CacheRefresher,
    ) -> Result<Vec<TickAction>> {
        let actions = self.plan(idle_seconds, session.last_activity(), Utc::now());

        for action in &actions {
            match action {
                TickAction::LogIdle(secs) => {
                    debug!(idle_secs = secs, "No reply from the server for {} seconds.", secs);
                }
                TickAction::Keepalive => {
                    debug!("Sending keep-alive.");
                    session.request(KEEPALIVE_COMMAND).await?;
                }
                TickAction::Refresh(view) => {
                    refresher.refresh(*view, session).await?;
                }
            }
        }

        Ok(actions)
    }
}

impl Default for IdleScheduler {
    fn default() -> Self {
        Self::new()
    }
}
