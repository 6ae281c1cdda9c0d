//! Authenticated relay connection with command correlation and auto-reconnect.
//!
//! Owns a single WebSocket to the hub relay. On open it sends the
//! `authenticate` handshake; once `auth_success` arrives, commands may be
//! sent and are matched to their `result` frames by correlation id.
//! `state_changed` events are pushed to the attached [`Frontend`].
//! Dropped sockets are retried with linearly growing delays until the
//! attempt budget runs out.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use haremote_api::{Command, Connection, ConnectionConfig, Credentials};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ConnectionConfig::new("wss://relay.example.net/ws/opp_energy/".parse()?, "cabin");
//! let credentials = Arc::new(Credentials::new("me@example.com", "hunter2"));
//! let connection = Connection::connect(config, credentials, frontend, CancellationToken::new());
//!
//! connection.wait_authenticated().await?;
//! let states = connection.send_command(Command::GetStates).await?;
//!
//! connection.shutdown();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::CredentialSource;
use crate::error::Error;
use crate::frontend::{Frontend, HassOptions};
use crate::protocol::{Authenticate, Command, CommandFrame, CommandResult, Inbound, STATE_CHANGED};

// ── Defaults ─────────────────────────────────────────────────────────

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Linear backoff configuration: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay unit. Default: 1s.
    pub base_delay: Duration,

    /// Consecutive failed attempts tolerated before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Plan the attempt that follows a dropped session.
    ///
    /// `previous_attempt` is the attempt number of the session that just
    /// ended (0 for the initial connect). A session that authenticated
    /// resets the count. Returns the next attempt number with its delay,
    /// or `None` once the budget is spent.
    pub fn next(&self, previous_attempt: u32, was_authenticated: bool) -> Option<(u32, Duration)> {
        let attempt = if was_authenticated {
            1
        } else {
            previous_attempt.saturating_add(1)
        };

        (attempt <= self.max_attempts).then(|| (attempt, self.base_delay.saturating_mul(attempt)))
    }
}

// ── ConnectionConfig ─────────────────────────────────────────────────

/// How to reach and log into the relay.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`).
    pub url: Url,
    /// Site identifier sent with the handshake.
    pub site_name: String,
    /// How long a command waits for its `result` frame. Default: 10s.
    pub command_timeout: Duration,
    /// Bound on opening the socket, before the handshake. Default: 30s.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    pub fn new(url: Url, site_name: impl Into<String>) -> Self {
        Self {
            url,
            site_name: site_name.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable through [`Connection::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Socket opening or handshake in flight. Attempt 0 is the initial connect.
    Connecting { attempt: u32 },
    Authenticated,
    /// Reconnect budget exhausted; no further attempts will be scheduled.
    Failed,
}

impl ConnectionState {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Handle to a running relay connection.
///
/// Cheaply cloneable via `Arc<ConnectionInner>`. Only the background task
/// spawned by [`connect`](Self::connect) reads from or writes to the socket;
/// handles reach it through a channel that exists only while authenticated.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    config: ConnectionConfig,
    credentials: Arc<dyn CredentialSource>,
    frontend: Arc<dyn Frontend>,
    state: watch::Sender<ConnectionState>,
    outbound: ArcSwapOption<mpsc::UnboundedSender<String>>,
    pending: DashMap<u64, oneshot::Sender<CommandResult>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

enum SessionEnd {
    Closed,
    Cancelled,
}

/// Removes a waiter from the pending map when its `send_command` future
/// finishes or is dropped early.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, oneshot::Sender<CommandResult>>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

impl Connection {
    /// Spawn the connection task and return immediately.
    ///
    /// The first socket opens asynchronously; use
    /// [`wait_authenticated`](Self::wait_authenticated) or watch
    /// [`state`](Self::state) to learn when commands can be sent.
    pub fn connect(
        config: ConnectionConfig,
        credentials: Arc<dyn CredentialSource>,
        frontend: Arc<dyn Frontend>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let connection = Self {
            inner: Arc::new(ConnectionInner {
                config,
                credentials,
                frontend,
                state,
                outbound: ArcSwapOption::empty(),
                pending: DashMap::new(),
                next_id: AtomicU64::new(1),
                cancel,
            }),
        };

        let task = connection.clone();
        tokio::spawn(async move { task.run().await });

        connection
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of commands still waiting for a reply.
    pub fn pending_commands(&self) -> usize {
        self.inner.pending.len()
    }

    /// Resolve once authenticated; fail if the manager gives up or shuts down.
    pub async fn wait_authenticated(&self) -> Result<(), Error> {
        let mut rx = self.inner.state.subscribe();
        let reached = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(Error::NotConnected),
            state = rx.wait_for(|s| matches!(s, ConnectionState::Authenticated | ConnectionState::Failed)) => {
                let state = state.map_err(|_| Error::NotConnected)?;
                *state
            }
        };

        match reached {
            ConnectionState::Authenticated => Ok(()),
            _ => Err(Error::GaveUp {
                attempts: self.inner.config.reconnect.max_attempts,
            }),
        }
    }

    /// Signal the background task to close the socket and stop.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a command and wait for its correlated reply.
    ///
    /// Fails immediately with [`Error::NotConnected`] unless authenticated.
    /// Nothing is buffered or retried.
    pub async fn send_command(&self, command: Command) -> Result<serde_json::Value, Error> {
        if !self.inner.state.borrow().is_authenticated() {
            return Err(Error::NotConnected);
        }
        let Some(outbound) = self.inner.outbound.load_full() else {
            return Err(Error::NotConnected);
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&CommandFrame {
            id,
            command: &command,
        })?;

        // Register before sending so an immediate reply cannot slip past.
        let (waiter, reply) = oneshot::channel();
        self.inner.pending.insert(id, waiter);
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id,
        };

        if outbound.send(frame).is_err() {
            return Err(Error::NotConnected);
        }
        tracing::debug!(id, kind = command.kind(), "command sent");

        let timeout = self.inner.config.command_timeout;
        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(result)) => result.into_result(),
            Ok(Err(_)) => Err(Error::ConnectionLost { id }),
            Err(_) => {
                tracing::warn!(id, kind = command.kind(), "command timed out");
                Err(Error::CommandTimeout {
                    id,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    // ── Background reconnection loop ─────────────────────────────────

    /// Main loop: connect → authenticate → read → on drop, backoff → reconnect.
    async fn run(self) {
        let reconnect = self.inner.config.reconnect.clone();
        let mut attempt: u32 = 0;

        loop {
            self.inner
                .state
                .send_replace(ConnectionState::Connecting { attempt });

            let mut authenticated = false;
            let result = self.session(&mut authenticated).await;
            self.teardown();

            match result {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Closed) => tracing::info!(attempt, "relay socket closed"),
                Err(e) => tracing::warn!(error = %e, attempt, "relay session failed"),
            }
            if self.inner.cancel.is_cancelled() {
                break;
            }

            self.inner.state.send_replace(ConnectionState::Disconnected);

            let Some((next, delay)) = reconnect.next(attempt, authenticated) else {
                tracing::error!(
                    max_attempts = reconnect.max_attempts,
                    "relay reconnection limit reached, giving up"
                );
                self.inner.frontend.detach();
                self.inner.state.send_replace(ConnectionState::Failed);
                return;
            };

            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt = next,
                "waiting before reconnect"
            );

            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            attempt = next;
        }

        self.inner.frontend.detach();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        tracing::debug!("relay loop exiting");
    }

    /// Unpublish the writer and settle every waiter bound to the dead socket.
    fn teardown(&self) {
        self.inner.outbound.store(None);

        let abandoned = self.inner.pending.len();
        self.inner.pending.clear();
        if abandoned > 0 {
            tracing::debug!(abandoned, "settled pending commands as lost");
        }
    }

    // ── Single socket lifecycle ──────────────────────────────────────

    /// Open one socket, authenticate, and pump frames until it drops.
    ///
    /// Sets `authenticated` as soon as the handshake succeeds so the caller
    /// can reset its backoff even when the session later fails.
    async fn session(&self, authenticated: &mut bool) -> Result<SessionEnd, Error> {
        let inner = &self.inner;
        tracing::info!(url = %inner.config.url, "connecting to relay");

        let (ws_stream, _response) = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            result = tokio::time::timeout(
                inner.config.connect_timeout,
                tokio_tungstenite::connect_async(inner.config.url.as_str()),
            ) => {
                let Ok(opened) = result else {
                    return Err(Error::WebSocketConnect(format!(
                        "timed out after {}s",
                        inner.config.connect_timeout.as_secs()
                    )));
                };
                opened.map_err(|e| Error::WebSocketConnect(e.to_string()))?
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let credentials = inner.credentials.credentials()?;
        let handshake = serde_json::to_string(&Authenticate {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
            site_name: &inner.config.site_name,
        })?;
        write
            .send(Message::text(handshake))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
        tracing::debug!("handshake sent");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        // Published to command senders only after `auth_success`.
        let mut unpublished = Some(out_tx);

        loop {
            tokio::select! {
                biased;
                () = inner.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                }
                Some(frame) = out_rx.recv() => {
                    write
                        .send(Message::text(frame))
                        .await
                        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if self.dispatch(&text) {
                                if let Some(out_tx) = unpublished.take() {
                                    *authenticated = true;
                                    self.on_authenticated(out_tx);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            tracing::trace!("relay ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return closed_by_peer(frame.as_ref());
                        }
                        Some(Err(e)) => {
                            return Err(Error::WebSocketConnect(e.to_string()));
                        }
                        None => {
                            tracing::info!("relay stream ended");
                            return Ok(SessionEnd::Closed);
                        }
                        _ => {
                            // Binary, Pong, Frame -- ignore
                        }
                    }
                }
            }
        }
    }

    fn on_authenticated(&self, out_tx: mpsc::UnboundedSender<String>) {
        self.inner.outbound.store(Some(Arc::new(out_tx)));
        // Options land before the state flips, so anyone woken by
        // `wait_authenticated` sees an attached frontend.
        self.inner.frontend.set_options(HassOptions::new(self.clone()));
        self.inner.state.send_replace(ConnectionState::Authenticated);
        tracing::info!(site = %self.inner.config.site_name, "authenticated with relay");
    }

    // ── Inbound routing ──────────────────────────────────────────────

    /// Route one text frame. Returns `true` for `auth_success`.
    fn dispatch(&self, text: &str) -> bool {
        let message: Inbound = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "dropping unparseable frame");
                return false;
            }
        };

        match message {
            Inbound::AuthSuccess => return true,
            Inbound::Result(reply) => self.settle(reply),
            Inbound::Event { event } if event.event_type == STATE_CHANGED => {
                self.inner.frontend.update_state(event.data);
            }
            Inbound::Event { event } => {
                tracing::trace!(event_type = %event.event_type, "ignoring event");
            }
            Inbound::Other => tracing::trace!("ignoring frame"),
        }
        false
    }

    /// Hand a reply to its waiter, removing the waiter in the same step.
    fn settle(&self, reply: CommandResult) {
        match self.inner.pending.remove(&reply.id) {
            Some((id, waiter)) => {
                if waiter.send(reply).is_err() {
                    tracing::debug!(id, "waiter gone before reply arrived");
                }
            }
            None => tracing::debug!(id = reply.id, "dropping unsolicited result"),
        }
    }
}

/// A normal or empty close ends the session quietly; any other code is
/// reported as [`Error::WebSocketClosed`].
fn closed_by_peer(frame: Option<&CloseFrame>) -> Result<SessionEnd, Error> {
    let Some(cf) = frame else {
        tracing::info!("relay close frame received (no payload)");
        return Ok(SessionEnd::Closed);
    };
    tracing::info!(code = %cf.code, reason = %cf.reason, "relay close frame received");

    if cf.code == CloseCode::Normal {
        return Ok(SessionEnd::Closed);
    }
    Err(Error::WebSocketClosed {
        code: u16::from(cf.code),
        reason: cf.reason.as_str().to_owned(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
