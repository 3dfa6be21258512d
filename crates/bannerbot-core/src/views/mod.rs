//! Cached views of instance state
//!
//! A view is a flat `String -> String` snapshot that banner rendering reads
//! back from the cache. Each view has a fixed cache key suffix and TTL.

mod serverquery;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::instance::InstanceConfig;
use crate::session::{self, QuerySession};

pub use serverquery::ServerQueryViews;

/// Flat view mapping as written to the cache
pub type ViewData = BTreeMap<String, String>;

/// The four cached views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Current time in various formats
    Datetime,
    /// Connected clients
    ClientList,
    /// Server groups with online member counts
    ServergroupList,
    /// Virtual server summary
    VirtualserverInfo,
}

impl View {
    /// All views, in the order of a full refresh
    pub const ALL: [View; 4] = [
        View::Datetime,
        View::ClientList,
        View::ServergroupList,
        View::VirtualserverInfo,
    ];

    /// Suffix of the cache key
    pub fn key_suffix(self) -> &'static str {
        match self {
            View::Datetime => "datetime",
            View::ClientList => "clientlist",
            View::ServergroupList => "servergrouplist",
            View::VirtualserverInfo => "virtualserver_info",
        }
    }

    /// How long a written view stays in the cache
    pub fn ttl(self) -> Duration {
        match self {
            View::Datetime => Duration::from_secs(5 * 60),
            View::ClientList => Duration::from_secs(12 * 60 * 60),
            View::ServergroupList => Duration::from_secs(75),
            View::VirtualserverInfo => Duration::from_secs(15 * 60),
        }
    }

    /// Cache key of this view for one instance
    pub fn cache_key(self, instance_id: i64) -> String {
        format!("instance_{}_{}", instance_id, self.key_suffix())
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Datetime => write!(f, "datetime"),
            View::ClientList => write!(f, "client list"),
            View::ServergroupList => write!(f, "servergroup list"),
            View::VirtualserverInfo => write!(f, "virtualserver info"),
        }
    }
}

/// Computes views by reading from the session
#[async_trait]
pub trait ViewBuilder: Send + Sync {
    /// Current time in various formats
    async fn datetime(
        &self,
        session: &mut dyn QuerySession,
        instance: &InstanceConfig,
    ) -> session::Result<ViewData>;

    /// Connected clients
    async fn client_list(
        &self,
        session: &mut dyn QuerySession,
        instance: &InstanceConfig,
    ) -> session::Result<ViewData>;

    /// Server groups with online member counts
    async fn servergroup_list(
        &self,
        session: &mut dyn QuerySession,
        instance: &InstanceConfig,
    ) -> session::Result<ViewData>;

    /// Virtual server summary
    async fn virtualserver_info(
        &self,
        session: &mut dyn QuerySession,
        instance: &InstanceConfig,
    ) -> session::Result<ViewData>;

    /// Compute `view`
    async fn build(
        &self,
        view: View,
        session: &mut dyn QuerySession,
        instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        match view {
            View::Datetime => self.datetime(session, instance).await,
            View::ClientList => self.client_list(session, instance).await,
            View::ServergroupList => self.servergroup_list(session, instance).await,
            View::VirtualserverInfo => self.virtualserver_info(session, instance).await,
        }
    }
}
