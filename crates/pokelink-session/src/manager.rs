//! The connection manager: owns the socket and the background tasks.
//!
//! Responsibilities:
//! - Opening the connection and authenticating, bounded in time
//! - Running the receive, writer, and heartbeat tasks
//! - Handing parsed messages to the main loop through a FIFO queue
//! - Tearing everything down on disconnect, from any state
//!
//! # Concurrency note
//!
//! The inbound queue is the only structure touched by more than one task.
//! Everything else here is owned by the main loop, which calls
//! [`ConnectionManager::try_next`] once per frame and never blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pokelink_protocol::{
    decode_line, encode_line, AccountSnapshot, ClientMessage, JsonCodec,
    PlayerId, ServerMessage, PROTOCOL_VERSION,
};
use pokelink_transport::{Connection, TcpLineConnection};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{
    ConnectionConfig, ConnectionState, Credentials, LastError, Session,
    SessionError,
};

/// One entry in the inbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A successfully parsed server message, in receipt order.
    Message(ServerMessage),

    /// The connection ended. Always the last entry of a session.
    Closed { reason: String },
}

/// The background half of a live connection.
struct LiveConnection {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Cleared by whichever task sees the socket fail first.
    connected: Arc<AtomicBool>,
    receiver: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Result of a successful connect + auth exchange.
struct Handshake {
    conn: TcpLineConnection,
    client_id: PlayerId,
    /// Messages received up to and including `auth_success`.
    early: Vec<ServerMessage>,
}

/// Owns the connection to the game server.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ [Connected] ──→ try_next() ... ──→ disconnect()
///                    │                                  ↑
///                    └──(socket fault: Inbound::Closed)─┘
/// ```
pub struct ConnectionManager {
    config: ConnectionConfig,
    codec: JsonCodec,
    state: ConnectionState,
    session: Option<Session>,
    last_error: Option<LastError>,
    live: Option<LiveConnection>,
    /// Publishes `true` while connected. Waiters elsewhere subscribe to it
    /// and treat `false` as cancellation.
    liveness: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    pub fn new(config: ConnectionConfig) -> Self {
        let (liveness, _) = watch::channel(false);
        Self {
            config: config.validated(),
            codec: JsonCodec,
            state: ConnectionState::Disconnected,
            session: None,
            last_error: None,
            live: None,
            liveness,
        }
    }

    /// Connects and authenticates, reporting success as a boolean.
    ///
    /// On failure the reason is logged and kept in [`Self::last_error`].
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> bool {
        self.try_connect(host, port, Credentials::new(username, password))
            .await
            .is_ok()
    }

    /// Connects and authenticates, bounded by `connect_timeout_ms`.
    ///
    /// On success the receive, writer, and heartbeat tasks are running and
    /// the queue already holds `auth_success` (plus anything the server sent
    /// before it). On failure nothing is left running.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyConnected`] if a session is live.
    /// - [`SessionError::Timeout`] if the server didn't answer in time.
    /// - [`SessionError::Rejected`] if the server refused the login.
    /// - [`SessionError::Transport`] on refusal or socket failure.
    pub async fn try_connect(
        &mut self,
        host: &str,
        port: u16,
        credentials: Credentials,
    ) -> Result<PlayerId, SessionError> {
        if self.live.is_some() {
            return Err(SessionError::AlreadyConnected);
        }

        let addr = format!("{host}:{port}");
        tracing::info!(%addr, username = %credentials.username, "connecting");
        self.state = ConnectionState::Connecting;
        self.session = Some(Session::new(credentials.username.clone()));

        let bound = self.config.connect_timeout();
        let result = match tokio::time::timeout(
            bound,
            handshake(&self.codec, &addr, &credentials, bound),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                after_ms: self.config.connect_timeout_ms,
            }),
        };

        match result {
            Ok(handshake) => Ok(self.start(handshake)),
            Err(e) => {
                tracing::warn!(%addr, error = %e, "connect failed");
                self.state = ConnectionState::Disconnected;
                self.session = None;
                self.last_error = Some(LastError::new(e.to_string()));
                Err(e)
            }
        }
    }

    /// Spawns the background tasks for an authenticated connection.
    fn start(&mut self, handshake: Handshake) -> PlayerId {
        let Handshake {
            conn,
            client_id,
            early,
        } = handshake;
        let conn = Arc::new(conn);
        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        for msg in early {
            // The receiver is held right here, so this can't fail.
            let _ = inbound_tx.send(Inbound::Message(msg));
        }

        let writer = tokio::spawn(run_writer(
            Arc::clone(&conn),
            outbound_rx,
            inbound_tx.clone(),
            Arc::clone(&connected),
        ));
        let receiver = tokio::spawn(run_receiver(
            Arc::clone(&conn),
            self.codec,
            inbound_tx,
            Arc::clone(&connected),
        ));
        let heartbeat = tokio::spawn(run_heartbeat(
            outbound.downgrade(),
            self.codec,
            self.config.heartbeat_interval(),
            Arc::clone(&connected),
        ));

        self.live = Some(LiveConnection {
            outbound,
            inbound,
            connected,
            receiver,
            heartbeat,
            writer,
        });
        if let Some(session) = self.session.as_mut() {
            session.authenticated = true;
            session.client_id = Some(client_id);
        }
        self.state = ConnectionState::Connected;
        self.liveness.send_replace(true);
        tracing::info!(%client_id, "connected");
        client_id
    }

    /// Queues a message for the server.
    ///
    /// Silently dropped when not connected. An encode failure is treated
    /// like a socket fault and tears the connection down.
    pub fn send(&mut self, msg: &ClientMessage) {
        if !self.is_connected() {
            tracing::trace!(kind = msg.kind(), "not connected, dropping message");
            return;
        }
        let bytes = match encode_line(&self.codec, msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(kind = msg.kind(), error = %e, "failed to encode message");
                self.connection_lost(&format!("encode failed: {e}"));
                return;
            }
        };
        if let Some(live) = &self.live {
            if live.outbound.send(bytes).is_err() {
                tracing::debug!(kind = msg.kind(), "writer already stopped, dropping message");
            }
        }
    }

    /// Takes the next inbound entry without blocking.
    ///
    /// When the entry is [`Inbound::Closed`] the manager has already torn
    /// the connection down by the time it is returned.
    pub fn try_next(&mut self) -> Option<Inbound> {
        let live = self.live.as_mut()?;
        match live.inbound.try_recv() {
            Ok(Inbound::Closed { reason }) => {
                self.connection_lost(&reason);
                Some(Inbound::Closed { reason })
            }
            Ok(entry) => Some(entry),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                let reason = "connection tasks stopped".to_owned();
                self.connection_lost(&reason);
                Some(Inbound::Closed { reason })
            }
        }
    }

    /// Drains everything currently queued, in receipt order.
    pub fn drain(&mut self) -> Vec<Inbound> {
        let mut entries = Vec::new();
        while let Some(entry) = self.try_next() {
            entries.push(entry);
        }
        entries
    }

    /// Ends the session. Safe to call from any state, any number of times.
    ///
    /// If the socket is still healthy, the optional account snapshot and a
    /// `disconnect` notice are flushed first (bounded by
    /// `flush_timeout_ms`). Then every task is stopped and the session
    /// record is cleared.
    pub fn disconnect(&mut self, reason: &str, snapshot: Option<AccountSnapshot>) {
        if let Some(live) = self.live.take() {
            if live.connected.load(Ordering::Acquire) {
                if let Some(snapshot) = snapshot {
                    self.enqueue(&live, &ClientMessage::SaveState { snapshot });
                }
                self.enqueue(
                    &live,
                    &ClientMessage::Disconnect {
                        reason: reason.to_owned(),
                    },
                );
            }
            self.shutdown(live);
            tracing::info!(reason, "disconnected");
        }
        self.state = ConnectionState::Disconnected;
        self.session = None;
        self.liveness.send_replace(false);
    }

    /// Records a user-visible error (e.g. an authoritative rejection).
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(LastError::new(message));
    }

    /// The last error, unless it is older than `error_ttl_secs`.
    pub fn last_error(&self) -> Option<&LastError> {
        let ttl = self.config.error_ttl();
        self.last_error
            .as_ref()
            .filter(|e| !e.is_expired(ttl, Instant::now()))
    }

    /// Whether a live, healthy connection exists.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self
                .live
                .as_ref()
                .is_some_and(|live| live.connected.load(Ordering::Acquire))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Our server-assigned id, while connected.
    pub fn client_id(&self) -> Option<PlayerId> {
        self.session.as_ref().and_then(|s| s.client_id)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Subscribes to connection liveness. The value flips to `false` on
    /// every disconnect, which waiters use as a cancellation signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.liveness.subscribe()
    }

    fn connection_lost(&mut self, reason: &str) {
        tracing::warn!(reason, "connection lost");
        self.last_error = Some(LastError::new(format!("connection lost: {reason}")));
        self.disconnect(reason, None);
    }

    fn enqueue(&self, live: &LiveConnection, msg: &ClientMessage) {
        match encode_line(&self.codec, msg) {
            Ok(bytes) => {
                let _ = live.outbound.send(bytes);
            }
            Err(e) => tracing::warn!(kind = msg.kind(), error = %e, "dropping farewell message"),
        }
    }

    /// Stops the tasks of a connection. The writer gets `flush_timeout_ms`
    /// to drain what is already queued before it is aborted.
    fn shutdown(&self, live: LiveConnection) {
        let LiveConnection {
            outbound,
            inbound,
            connected,
            receiver,
            heartbeat,
            writer,
        } = live;
        connected.store(false, Ordering::Release);
        receiver.abort();
        heartbeat.abort();
        // Closing the channel lets the writer finish its queue and exit.
        drop(outbound);
        drop(inbound);

        let flush = self.config.flush_timeout();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let abort = writer.abort_handle();
                handle.spawn(async move {
                    if tokio::time::timeout(flush, writer).await.is_err() {
                        tracing::debug!("writer did not flush in time, aborting");
                        abort.abort();
                    }
                });
            }
            Err(_) => writer.abort(),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            self.shutdown(live);
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// TCP connect, send `auth`, wait for `auth_success` or `error`.
async fn handshake(
    codec: &JsonCodec,
    addr: &str,
    credentials: &Credentials,
    bound: Duration,
) -> Result<Handshake, SessionError> {
    let conn = TcpLineConnection::connect(addr, bound).await?;
    let auth = ClientMessage::Auth {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
        version: PROTOCOL_VERSION,
    };
    conn.send(&encode_line(codec, &auth)?).await?;

    let mut early = Vec::new();
    loop {
        let Some(line) = conn.recv().await? else {
            return Err(SessionError::ClosedDuringHandshake);
        };
        let msg = match decode_line(codec, &line) {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed message during handshake");
                continue;
            }
        };
        match msg {
            ServerMessage::AuthSuccess { client_id, .. } => {
                early.push(msg);
                return Ok(Handshake {
                    conn,
                    client_id,
                    early,
                });
            }
            ServerMessage::Error { code, message } => {
                return Err(SessionError::Rejected { code, message });
            }
            other => early.push(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Reads one line at a time and queues every message that parses.
async fn run_receiver(
    conn: Arc<TcpLineConnection>,
    codec: JsonCodec,
    inbound: mpsc::UnboundedSender<Inbound>,
    connected: Arc<AtomicBool>,
) {
    let conn_id = conn.id();
    let reason = loop {
        match conn.recv().await {
            Ok(Some(line)) => match decode_line(&codec, &line) {
                Ok(Some(msg)) => {
                    if inbound.send(Inbound::Message(msg)).is_err() {
                        // Manager is gone; nobody to tell.
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "dropping malformed message");
                }
            },
            Ok(None) => break "server closed the connection".to_owned(),
            Err(e) => break e.to_string(),
        }
    };
    connected.store(false, Ordering::Release);
    tracing::debug!(%conn_id, %reason, "receive loop ended");
    let _ = inbound.send(Inbound::Closed { reason });
}

/// Writes queued lines until the channel closes, then closes the socket.
async fn run_writer(
    conn: Arc<TcpLineConnection>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: mpsc::UnboundedSender<Inbound>,
    connected: Arc<AtomicBool>,
) {
    let conn_id = conn.id();
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = conn.send(&bytes).await {
            tracing::warn!(%conn_id, error = %e, "write failed");
            connected.store(false, Ordering::Release);
            let _ = inbound.send(Inbound::Closed {
                reason: e.to_string(),
            });
            return;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "socket close failed");
    }
    tracing::debug!(%conn_id, "writer finished");
}

/// Sends a keep-alive every `interval` while connected.
async fn run_heartbeat(
    outbound: mpsc::WeakUnboundedSender<Vec<u8>>,
    codec: JsonCodec,
    interval: Duration,
    connected: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if !connected.load(Ordering::Acquire) {
            break;
        }
        let Some(outbound) = outbound.upgrade() else {
            break;
        };
        let msg = ClientMessage::Heartbeat {
            client_time: unix_millis(),
        };
        match encode_line(&codec, &msg) {
            Ok(bytes) => {
                if outbound.send(bytes).is_err() {
                    break;
                }
                tracing::trace!("heartbeat queued");
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode heartbeat"),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
