//! In-memory stand-ins for the bot's collaborators
//!
//! Every fake appends to a shared [`Journal`] so tests can assert the order
//! in which the session, views, cache and registry were touched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheError, CacheStore};
use crate::instance::{InstanceConfig, InstanceError, InstanceLoader};
use crate::registry::{self, NewProcessRecord, ProcessRecord, ProcessRegistry, RegistryError};
use crate::session::{
    self, PushScope, QuerySession, Reply, SessionError, SessionProvider, SessionSignal,
    SessionState, QUIT_COMMAND,
};
use crate::views::{View, ViewBuilder, ViewData};

/// Ordered log of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Position of the first entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }
}

/// Instance pointing at a local ServerQuery port
pub fn instance_at(id: i64, port: u16) -> InstanceConfig {
    InstanceConfig {
        id,
        virtualserver_name: format!("Test Server {}", id),
        host: "127.0.0.1".to_string(),
        voice_port: 9987,
        serverquery_port: port,
        serverquery_username: "serveradmin".to_string(),
        serverquery_password: SecretString::from("s3cr/t".to_string()),
        client_nickname: None,
    }
}

/// One scripted `wait` outcome
#[derive(Debug, Clone)]
pub enum Step {
    Signal(SessionSignal),
    Fail(String),
}

/// Scripted session
pub struct FakeSession {
    journal: Journal,
    state: SessionState,
    last_activity: DateTime<Utc>,
    replies: HashMap<String, Reply>,
    script: VecDeque<Step>,
    on_exhausted: Option<CancellationToken>,
    stall: Option<(String, CancellationToken)>,
}

impl FakeSession {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: SessionState::Active,
            last_activity: Utc::now(),
            replies: HashMap::new(),
            script: VecDeque::new(),
            on_exhausted: None,
            stall: None,
        }
    }

    pub fn reply_to(&mut self, command: &str, reply: Reply) {
        self.replies.insert(command.to_string(), reply);
    }

    pub fn set_last_activity(&mut self, at: DateTime<Utc>) {
        self.last_activity = at;
    }

    pub fn push_signal(&mut self, signal: SessionSignal) {
        self.script.push_back(Step::Signal(signal));
    }

    pub fn push_failure(&mut self, message: &str) {
        self.script.push_back(Step::Fail(message.to_string()));
    }

    /// Cancel `token` once the script runs out, then block
    pub fn cancel_when_exhausted(&mut self, token: CancellationToken) {
        self.on_exhausted = Some(token);
    }

    /// Never answer `command`; cancel `token` once it is sent
    pub fn stall_on(&mut self, command: &str, token: CancellationToken) {
        self.stall = Some((command.to_string(), token));
    }
}

#[async_trait]
impl QuerySession for FakeSession {
    fn state(&self) -> SessionState {
        self.state
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    async fn request(&mut self, command: &str) -> session::Result<Reply> {
        self.journal.push(format!("request:{}", command));
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive(self.state));
        }
        if let Some((stalled, token)) = &self.stall {
            if stalled == command {
                token.cancel();
                return std::future::pending().await;
            }
        }
        self.last_activity = Utc::now();
        if command == QUIT_COMMAND {
            self.state = SessionState::Closed;
        }
        Ok(self.replies.get(command).cloned().unwrap_or_default())
    }

    async fn register_push_scope(&mut self, scope: PushScope) -> session::Result<()> {
        let name = match scope {
            PushScope::Server => "server".to_string(),
            PushScope::Channel(id) => format!("channel:{}", id),
        };
        self.journal.push(format!("register:{}", name));
        Ok(())
    }

    async fn wait(&mut self) -> session::Result<SessionSignal> {
        match self.script.pop_front() {
            Some(Step::Signal(signal)) => Ok(signal),
            Some(Step::Fail(message)) => {
                self.state = SessionState::Closed;
                Err(SessionError::Transport(message))
            }
            None => {
                if let Some(token) = self.on_exhausted.take() {
                    token.cancel();
                }
                std::future::pending().await
            }
        }
    }
}

/// Views that return canned data and count their builds
#[derive(Default)]
pub struct FakeViews {
    journal: Journal,
    builds: Mutex<HashMap<View, u64>>,
    failing: Mutex<HashSet<View>>,
    cancel_on: Mutex<Option<(View, CancellationToken)>>,
}

impl FakeViews {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn fail_on(&self, view: View) {
        self.failing.lock().unwrap().insert(view);
    }

    /// Cancel `token` while `view` is being built
    pub fn cancel_during(&self, view: View, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((view, token));
    }

    fn produce(&self, view: View) -> session::Result<ViewData> {
        self.journal.push(format!("build:{}", view.key_suffix()));

        if let Some((target, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *target == view {
                token.cancel();
            }
        }
        if self.failing.lock().unwrap().contains(&view) {
            return Err(SessionError::Transport("connection reset by peer".to_string()));
        }

        let mut builds = self.builds.lock().unwrap();
        let count = builds.entry(view).or_insert(0);
        *count += 1;

        let mut data = ViewData::new();
        data.insert("view".to_string(), view.key_suffix().to_string());
        data.insert("build".to_string(), count.to_string());
        Ok(data)
    }
}

#[async_trait]
impl ViewBuilder for FakeViews {
    async fn datetime(
        &self,
        _session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        self.produce(View::Datetime)
    }

    async fn client_list(
        &self,
        _session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        self.produce(View::ClientList)
    }

    async fn servergroup_list(
        &self,
        _session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        self.produce(View::ServergroupList)
    }

    async fn virtualserver_info(
        &self,
        _session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        self.produce(View::VirtualserverInfo)
    }
}

/// A successful cache write
#[derive(Debug, Clone)]
pub struct CacheWrite {
    pub key: String,
    pub ttl: Duration,
    pub values: ViewData,
}

/// In-memory cache
pub struct MemoryCache {
    journal: Journal,
    writes: Mutex<Vec<CacheWrite>>,
    available: AtomicBool,
}

impl MemoryCache {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            writes: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn writes(&self) -> Vec<CacheWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Latest value written under `key`
    pub fn get(&self, key: &str) -> Option<ViewData> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|w| w.key == key)
            .map(|w| w.values.clone())
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set_with_ttl(
        &self,
        key: &str,
        values: &ViewData,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.journal.push(format!("cache:{}", key));
        self.writes.lock().unwrap().push(CacheWrite {
            key: key.to_string(),
            ttl,
            values: values.clone(),
        });
        Ok(())
    }
}

/// In-memory process registry
pub struct MemoryRegistry {
    journal: Journal,
    records: Mutex<Vec<ProcessRecord>>,
    next_id: AtomicI64,
    fail_create: AtomicBool,
}

impl MemoryRegistry {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_create: AtomicBool::new(false),
        }
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ProcessRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRegistry for MemoryRegistry {
    async fn create(&self, record: NewProcessRecord) -> registry::Result<ProcessRecord> {
        self.journal.push("registry:create");
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RegistryError::Database(sqlx::Error::PoolTimedOut));
        }
        let stored = ProcessRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            instance_id: record.instance_id,
            process_id: record.process_id,
            command: record.command,
            created_at: Utc::now(),
        };
        self.records.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, record: &ProcessRecord) -> registry::Result<bool> {
        self.journal.push("registry:delete");
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != record.id);
        Ok(records.len() != before)
    }

    async fn list_for_instance(&self, instance_id: i64) -> registry::Result<Vec<ProcessRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> registry::Result<Vec<ProcessRecord>> {
        Ok(self.records())
    }
}

/// Instance loader over a fixed set of ids
#[derive(Default)]
pub struct FakeInstances {
    ports: HashMap<i64, u16>,
}

impl FakeInstances {
    pub fn with(mut self, id: i64, port: u16) -> Self {
        self.ports.insert(id, port);
        self
    }
}

#[async_trait]
impl InstanceLoader for FakeInstances {
    async fn load(&self, instance_id: i64) -> Result<InstanceConfig, InstanceError> {
        self.ports
            .get(&instance_id)
            .map(|port| instance_at(instance_id, *port))
            .ok_or(InstanceError::NotFound(instance_id))
    }
}

/// Hands out one prepared session
pub struct FakeProvider {
    journal: Journal,
    session: Mutex<Option<FakeSession>>,
}

impl FakeProvider {
    pub fn new(journal: Journal, session: FakeSession) -> Self {
        Self {
            journal,
            session: Mutex::new(Some(session)),
        }
    }

    /// A provider whose server refuses connections
    pub fn refusing(journal: Journal) -> Self {
        Self {
            journal,
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn open(&self, _instance: &InstanceConfig) -> session::Result<Box<dyn QuerySession>> {
        self.journal.push("session:open");
        match self.session.lock().unwrap().take() {
            Some(session) => Ok(Box::new(session)),
            None => Err(SessionError::Transport("connection refused".to_string())),
        }
    }
}
