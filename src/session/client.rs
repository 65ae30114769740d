//! Soundboard session client
//!
//! Owns the single control connection and the session identity. The
//! connection is opened lazily by the first command and kept until the server
//! closes it, an error occurs, or [`SessionClient::disconnect`] is called.
//!
//! ```text
//!            ensure_connected()               connect ok
//!  Closed ---------------------> Connecting ---------------> Open
//!    ^                               |                        |
//!    |         connect error         |     remote close /     |
//!    +-------------------------------+<----- send error ------+
//! ```
//!
//! While `Connecting`, the attempt is stored as a shared future: every caller
//! arriving in that state awaits the same attempt and gets the same outcome.
//! An attempt abandoned by `disconnect` stays in the slot until it settles, so
//! a new attempt never overlaps it.

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::protocol::{self, PlaySoundSpec};
use crate::session::endpoint::{Endpoints, SessionIdentity};
use crate::session::transport::{Connection, Transport, WebSocketTransport};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

type ConnectAttempt = Shared<BoxFuture<'static, Result<Arc<Connection>, SessionError>>>;

enum Slot {
    Closed,
    Connecting {
        generation: u64,
        attempt: ConnectAttempt,
    },
    Open {
        generation: u64,
        connection: Arc<Connection>,
    },
    /// Disconnected while connecting; the attempt is still running
    Abandoned {
        generation: u64,
        attempt: ConnectAttempt,
    },
}

enum Step {
    Join(ConnectAttempt),
    Drain(ConnectAttempt),
}

struct SlotState {
    slot: Slot,
    next_generation: u64,
}

impl SlotState {
    fn generation(&self) -> Option<u64> {
        match &self.slot {
            Slot::Closed => None,
            Slot::Connecting { generation, .. }
            | Slot::Open { generation, .. }
            | Slot::Abandoned { generation, .. } => Some(*generation),
        }
    }
}

/// Remote soundboard client
pub struct SessionClient {
    endpoints: Endpoints,
    identity: RwLock<SessionIdentity>,
    state: Arc<Mutex<SlotState>>,
    transport: Arc<dyn Transport>,
    http: reqwest::Client,
    connect_timeout: Option<Duration>,
}

impl SessionClient {
    /// Client using the WebSocket transport
    pub fn new(config: &ServerConfig) -> Result<Self, SessionError> {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    pub fn with_transport(
        config: &ServerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionError> {
        let endpoints = Endpoints::parse(&config.base_url)?;
        let connect_timeout = config.connect_timeout();

        let mut http = reqwest::Client::builder();
        if let Some(limit) = connect_timeout {
            http = http.connect_timeout(limit);
        }
        let http = http
            .build()
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            endpoints,
            identity: RwLock::new(SessionIdentity::default()),
            state: Arc::new(Mutex::new(SlotState {
                slot: Slot::Closed,
                next_generation: 0,
            })),
            transport,
            http,
            connect_timeout,
        })
    }

    /// Set the guild and channel, replacing both.
    ///
    /// An open connection keeps the identity it was opened with.
    pub fn init(&self, guild_id: impl Into<String>, channel_id: impl Into<String>) {
        let identity = SessionIdentity::new(guild_id, channel_id);
        debug!("Session identity set to {:?}", identity);
        *self.identity.write() = identity;
    }

    pub fn identity(&self) -> SessionIdentity {
        self.identity.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        match &self.state.lock().slot {
            Slot::Closed => ConnectionState::Closed,
            Slot::Connecting { .. } => ConnectionState::Connecting,
            Slot::Open { connection, .. } if connection.is_open() => ConnectionState::Open,
            Slot::Open { .. } | Slot::Abandoned { .. } => ConnectionState::Closed,
        }
    }

    /// Return the open connection, opening one if needed.
    pub async fn ensure_connected(&self) -> Result<Arc<Connection>, SessionError> {
        loop {
            let step = {
                let mut state = self.state.lock();
                match &state.slot {
                    Slot::Open { connection, .. } if connection.is_open() => {
                        return Ok(connection.clone());
                    }
                    Slot::Connecting { attempt, .. } => Step::Join(attempt.clone()),
                    Slot::Abandoned { attempt, .. } => Step::Drain(attempt.clone()),
                    Slot::Open { .. } | Slot::Closed => {
                        state.slot = Slot::Closed;

                        let identity = self.identity();
                        if !identity.is_complete() {
                            return Err(SessionError::IdentityNotConfigured);
                        }

                        state.next_generation += 1;
                        let generation = state.next_generation;
                        let url = self.endpoints.control_url(&identity);
                        info!("Connecting to {}", url);

                        let attempt = self.connect_attempt(generation, url);
                        state.slot = Slot::Connecting {
                            generation,
                            attempt: attempt.clone(),
                        };
                        Step::Join(attempt)
                    }
                }
            };

            match step {
                Step::Join(attempt) => return attempt.await,
                Step::Drain(attempt) => {
                    debug!("Waiting for abandoned connect attempt to settle");
                    let _ = attempt.await;
                }
            }
        }
    }

    fn connect_attempt(&self, generation: u64, url: Url) -> ConnectAttempt {
        let transport = self.transport.clone();
        let state = Arc::downgrade(&self.state);
        let connect_timeout = self.connect_timeout;

        async move {
            let result = match connect_timeout {
                Some(limit) => tokio::time::timeout(limit, transport.connect(&url))
                    .await
                    .unwrap_or_else(|_| Err(SessionError::ConnectTimeout(limit.as_millis() as u64))),
                None => transport.connect(&url).await,
            };

            // Client dropped while connecting
            let Some(state) = state.upgrade() else {
                return Err(SessionError::Disconnected);
            };
            let mut guard = state.lock();
            match &guard.slot {
                Slot::Connecting { generation: current, .. } if *current == generation => {}
                Slot::Abandoned { generation: current, .. } if *current == generation => {
                    debug!("Discarding abandoned connect attempt");
                    guard.slot = Slot::Closed;
                    return Err(SessionError::Disconnected);
                }
                _ => return Err(SessionError::Disconnected),
            }

            match result {
                Ok(connection) => {
                    let connection = Arc::new(connection);
                    guard.slot = Slot::Open {
                        generation,
                        connection: connection.clone(),
                    };
                    drop(guard);

                    let closed = connection.on_close();
                    let watched: Weak<Mutex<SlotState>> = Arc::downgrade(&state);
                    tokio::spawn(async move {
                        closed.await;
                        let Some(watched) = watched.upgrade() else {
                            return;
                        };
                        let mut guard = watched.lock();
                        if matches!(guard.slot, Slot::Open { .. }) && guard.generation() == Some(generation) {
                            info!("Connection closed by server");
                            guard.slot = Slot::Closed;
                        }
                    });

                    Ok(connection)
                }
                Err(e) => {
                    warn!("Connection attempt failed: {}", e);
                    guard.slot = Slot::Closed;
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop the current connection, or abandon the attempt in flight
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        if matches!(state.slot, Slot::Open { .. } | Slot::Connecting { .. }) {
            info!("Closing connection");
        }
        state.slot = abandon(std::mem::replace(&mut state.slot, Slot::Closed));
    }

    /// Disconnect, then wait until the transport has flushed queued commands
    /// and closed its side.
    pub async fn close(&self) {
        let closed = {
            let mut state = self.state.lock();
            let closed = match &state.slot {
                Slot::Open { connection, .. } => Some(connection.on_close()),
                _ => None,
            };
            state.slot = abandon(std::mem::replace(&mut state.slot, Slot::Closed));
            closed
        };

        if let Some(closed) = closed {
            info!("Closing connection");
            closed.await;
        }
    }

    /// Send one command string, connecting first if needed
    pub async fn send_command(&self, command: &str) -> Result<(), SessionError> {
        let connection = self.ensure_connected().await?;
        debug!("Send command: {}", command);

        if let Err(e) = connection.send(command.to_string()) {
            self.discard(&connection);
            return Err(e);
        }
        Ok(())
    }

    fn discard(&self, connection: &Arc<Connection>) {
        let mut state = self.state.lock();
        if let Slot::Open { connection: current, .. } = &state.slot {
            if Arc::ptr_eq(current, connection) {
                state.slot = Slot::Closed;
            }
        }
    }

    pub async fn play(&self, name: &str) -> Result<(), SessionError> {
        self.send_command(&protocol::play(name)).await
    }

    pub async fn play_multiple(&self, specs: &[PlaySoundSpec]) -> Result<(), SessionError> {
        self.send_command(&protocol::play_multiple(specs)).await
    }

    pub async fn play_multiple_instruction(&self, instruction: &str) -> Result<(), SessionError> {
        self.send_command(&protocol::play_multiple_instruction(instruction))
            .await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send_command(&protocol::stop()).await
    }

    /// Upload a packed blob as a new sound for the current identity
    pub async fn upload(&self, blob: Bytes) -> Result<(), SessionError> {
        let identity = self.identity();
        if !identity.is_complete() {
            return Err(SessionError::IdentityNotConfigured);
        }

        let url = self.endpoints.upload_url(&identity);
        info!("Upload sound ({} bytes)", blob.len());

        let response = self
            .http
            .post(url)
            .body(blob)
            .send()
            .await
            .map_err(|e| SessionError::UploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upload rejected: {}", status);
            return Err(SessionError::UploadRejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Slot after a deliberate close. A pending attempt is kept until it settles.
fn abandon(slot: Slot) -> Slot {
    match slot {
        Slot::Connecting { generation, attempt } | Slot::Abandoned { generation, attempt } => {
            Slot::Abandoned { generation, attempt }
        }
        Slot::Open { .. } | Slot::Closed => Slot::Closed,
    }
}
