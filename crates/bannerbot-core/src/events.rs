//! Pushed-event routing
//!
//! Clients joining or leaving (including kicks and bans, which arrive as
//! left-view notifications) change the client list, the online counts per
//! server group and the server summary. Everything else is ignored.

use tracing::debug;

use crate::cache::CacheRefresher;
use crate::error::Result;
use crate::session::{QuerySession, ServerEvent};
use crate::views::View;

/// Views refreshed after a membership change, in refresh order
pub const MEMBERSHIP_REFRESHES: [View; 3] = [
    View::ClientList,
    View::ServergroupList,
    View::VirtualserverInfo,
];

/// Maps pushed events to cache refreshes
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRouter;

impl EventRouter {
    /// Create the router
    pub fn new() -> Self {
        Self
    }

    /// Views an event invalidates
    pub fn route(&self, event: &ServerEvent) -> &'static [View] {
        if event.is_membership_change() {
            &MEMBERSHIP_REFRESHES
        } else {
            &[]
        }
    }

    /// Handle one pushed event
    pub async fn on_event(
        &self,
        event: &ServerEvent,
        session: &mut dyn QuerySession,
        refresher: &CacheRefresher,
    ) -> Result<()> {
        debug!(event = %event.name(), kind = ?event.kind(), "Received the following event: {}", event.name());

        let views = self.route(event);
        if views.is_empty() {
            return Ok(());
        }

        refresher.refresh_many(views, session).await?;
        Ok(())
    }
}
