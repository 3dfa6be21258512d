//! ServerQuery session adapter
//!
//! A thin adapter that speaks just enough of the line-based TeamSpeak 3
//! ServerQuery interface for the bot: login, virtual server selection,
//! event registration, plain requests and notification waiting.
//!
//! Notifications can arrive between a request and its reply; they are
//! queued and handed out by the next `wait` call.

pub mod codec;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, trace};

use super::{
    IdleCounter, PushScope, QuerySession, Reply, Result, ServerEvent, SessionError,
    SessionProvider, SessionSignal, SessionState, QUIT_COMMAND,
};
use crate::instance::InstanceConfig;

/// Largest accepted line; client lists of big servers are long
const MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

/// How long `wait` listens before reporting an idle tick
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Error id the server uses for "no rows" on list commands
const EMPTY_RESULT_SET: u32 = 1281;

/// Connection settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout for a single request/reply round-trip
    pub request_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens ServerQuery sessions over TCP
#[derive(Debug, Clone, Default)]
pub struct ServerQueryProvider {
    settings: SessionSettings,
}

impl ServerQueryProvider {
    /// Create a provider with the given settings
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionProvider for ServerQueryProvider {
    async fn open(&self, instance: &InstanceConfig) -> Result<Box<dyn QuerySession>> {
        let address = format!("{}:{}", instance.host, instance.serverquery_port);
        debug!(address = %address, "Connecting to ServerQuery");

        let stream = tokio::time::timeout(self.settings.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                SessionError::Transport(format!(
                    "connecting to `{}` timed out after {:?}",
                    address, self.settings.connect_timeout
                ))
            })?
            .map_err(|e| SessionError::Transport(format!("could not connect to `{}`: {}", address, e)))?;

        let mut session = ServerQuerySession::new(stream, self.settings.request_timeout);
        session.read_greeting().await?;

        session
            .request(&codec::command(
                "login",
                &[
                    ("client_login_name", instance.serverquery_username.as_str()),
                    (
                        "client_login_password",
                        instance.serverquery_password.expose_secret(),
                    ),
                ],
            ))
            .await?;

        let port = instance.voice_port.to_string();
        session
            .request(&codec::command("use", &[("port", port.as_str())]))
            .await?;

        if let Some(nickname) = &instance.client_nickname {
            session
                .request(&codec::command(
                    "clientupdate",
                    &[("client_nickname", nickname.as_str())],
                ))
                .await?;
        }

        session.state = SessionState::Active;
        info!(
            address = %address,
            voice_port = instance.voice_port,
            "ServerQuery session established"
        );
        Ok(Box::new(session))
    }
}

/// A ServerQuery session over a framed TCP stream
pub struct ServerQuerySession {
    framed: Framed<TcpStream, LinesCodec>,
    state: SessionState,
    last_activity: DateTime<Utc>,
    request_timeout: Duration,
    pending: VecDeque<ServerEvent>,
    idle: IdleCounter,
}

impl ServerQuerySession {
    fn new(stream: TcpStream, request_timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            state: SessionState::Connecting,
            last_activity: Utc::now(),
            request_timeout,
            pending: VecDeque::new(),
            idle: IdleCounter::new(),
        }
    }

    async fn read_greeting(&mut self) -> Result<()> {
        let greeting = tokio::time::timeout(self.request_timeout, async {
            let banner = self.next_line().await?;
            if banner != "TS3" {
                return Err(SessionError::Protocol {
                    code: 0,
                    message: format!("unexpected greeting `{}`", banner),
                });
            }
            // Welcome text
            self.next_line().await
        })
        .await
        .map_err(|_| SessionError::Timeout(self.request_timeout))??;

        trace!(greeting = %greeting, "ServerQuery greeting received");
        Ok(())
    }

    async fn next_line(&mut self) -> Result<String> {
        loop {
            match self.framed.next().await {
                Some(Ok(line)) => {
                    // Lines end with "\n\r", so the carriage return leads the next line
                    let line = line.trim_matches('\r');
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(line.to_string());
                }
                Some(Err(e)) => {
                    self.state = SessionState::Closed;
                    return Err(SessionError::Transport(e.to_string()));
                }
                None => {
                    self.state = SessionState::Closed;
                    return Err(SessionError::Transport(
                        "connection closed by the server".to_string(),
                    ));
                }
            }
        }
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut records = Vec::new();
        loop {
            let line = self.next_line().await?;

            if let Some(status) = codec::parse_status(&line) {
                return match status.code {
                    0 => Ok(Reply::new(records)),
                    EMPTY_RESULT_SET => Ok(Reply::default()),
                    code => Err(SessionError::Protocol {
                        code,
                        message: status.message,
                    }),
                };
            }

            if let Some(event) = codec::parse_notification(&line) {
                self.pending.push_back(event);
                continue;
            }

            records.extend(codec::parse_records(&line));
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Connecting | SessionState::Active => Ok(()),
            other => Err(SessionError::NotActive(other)),
        }
    }
}

#[async_trait]
impl QuerySession for ServerQuerySession {
    fn state(&self) -> SessionState {
        self.state
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    async fn request(&mut self, command: &str) -> Result<Reply> {
        self.ensure_usable()?;

        let quitting = command == QUIT_COMMAND;
        if quitting {
            self.state = SessionState::Closing;
        }

        self.last_activity = Utc::now();
        if let Err(e) = self.framed.send(command).await {
            self.state = SessionState::Closed;
            return Err(SessionError::Transport(e.to_string()));
        }

        let reply = match tokio::time::timeout(self.request_timeout, self.read_reply()).await {
            Ok(reply) => reply,
            Err(_) => {
                self.state = SessionState::Closed;
                Err(SessionError::Timeout(self.request_timeout))
            }
        };

        if quitting {
            self.state = SessionState::Closed;
        }
        reply
    }

    async fn register_push_scope(&mut self, scope: PushScope) -> Result<()> {
        let command = match scope {
            PushScope::Server => codec::command("servernotifyregister", &[("event", "server")]),
            PushScope::Channel(id) => {
                let id = id.to_string();
                codec::command(
                    "servernotifyregister",
                    &[("event", "channel"), ("id", id.as_str())],
                )
            }
        };
        self.request(&command).await?;
        debug!(scope = ?scope, "Registered for server events");
        Ok(())
    }

    async fn wait(&mut self) -> Result<SessionSignal> {
        self.ensure_usable()?;

        if let Some(event) = self.pending.pop_front() {
            self.idle.reset();
            return Ok(SessionSignal::Event(event));
        }

        loop {
            match tokio::time::timeout(IDLE_TICK, self.next_line()).await {
                Err(_) => return Ok(SessionSignal::IdleTick(self.idle.advance())),
                Ok(line) => {
                    let line = line?;
                    if let Some(event) = codec::parse_notification(&line) {
                        self.idle.reset();
                        return Ok(SessionSignal::Event(event));
                    }
                    trace!(line = %line, "Ignoring unsolicited line");
                }
            }
        }
    }
}
