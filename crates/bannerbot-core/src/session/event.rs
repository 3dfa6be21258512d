//! Pushed server events

use super::Record;

/// Why a client left the server
///
/// The server reports kicks and bans through the same left-view
/// notification as a regular disconnect; `reasonid` tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Connection timed out
    Timeout,
    /// Kicked from the server
    Kicked,
    /// Banned
    Banned,
    /// Left the server normally
    Disconnected,
    /// The server is shutting down
    ServerShutdown,
    /// Any other reason id
    Other(u32),
}

impl LeaveReason {
    /// Map a ServerQuery `reasonid`
    pub fn from_reason_id(id: u32) -> Self {
        match id {
            3 => Self::Timeout,
            5 => Self::Kicked,
            6 => Self::Banned,
            8 => Self::Disconnected,
            11 => Self::ServerShutdown,
            other => Self::Other(other),
        }
    }
}

/// Event classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A client joined the server
    ClientEnterView,
    /// A client left the server
    ClientLeftView(LeaveReason),
    /// Anything else (moves, text messages, channel edits, ...)
    Other(String),
}

/// An event pushed by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    kind: EventKind,
    name: String,
    fields: Record,
}

impl ServerEvent {
    /// Build an event from its notification name (without the `notify`
    /// prefix, e.g. `cliententerview`) and its fields
    pub fn new(name: impl Into<String>, fields: Record) -> Self {
        let name = name.into();
        let kind = match name.as_str() {
            "cliententerview" => EventKind::ClientEnterView,
            "clientleftview" => {
                let reason = fields
                    .get("reasonid")
                    .and_then(|id| id.parse::<u32>().ok())
                    .map(LeaveReason::from_reason_id)
                    .unwrap_or(LeaveReason::Disconnected);
                EventKind::ClientLeftView(reason)
            }
            other => EventKind::Other(other.to_string()),
        };
        Self { kind, name, fields }
    }

    /// Event classification
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Notification name, e.g. `clientleftview`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw event fields
    pub fn fields(&self) -> &Record {
        &self.fields
    }

    /// Whether the set of connected clients changed
    pub fn is_membership_change(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ClientEnterView | EventKind::ClientLeftView(_)
        )
    }
}
