//! Resilient connection manager for the game server.
//!
//! [`ConnectionManager`] owns the single [`Channel`] of the process together
//! with all connection state. It is constructed once at startup and shared by
//! reference with every consumer; nothing here is a hidden global.
//!
//! Connections are opened lazily: creating the manager or the channel does no
//! I/O. The first channel operation spawns a background driver task that
//! connects, runs the session and applies the reconnection policy:
//!
//! - a connection error is reported to the [`DiagnosticSink`] at most once
//!   per suppression window; the report marks the server as unavailable and
//!   disarms automatic reconnection,
//! - while the server is known to be unavailable, channel operations do not
//!   attempt to connect until the window has elapsed, after which the next
//!   operation makes exactly one fresh attempt,
//! - after a disconnect the driver retries with bounded exponential backoff,
//!   then leaves further attempts to channel operations.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = ConnectionManager::new(ClientConfig::from_env(), WebSocketConnector::default());
//! let channel = manager.channel();
//!
//! channel.on("timer-tick", |args| println!("tick {args:?}"))?;
//! channel.emit_with_ack("create-room", vec![], |ack| {
//!     if let Some(reason) = ack.rejection() {
//!         eprintln!("could not create room: {reason}");
//!     }
//! })?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{AckCallback, Channel, Listeners};
use crate::codec::{Frame, Handshake, Packet};
use crate::config::ClientConfig;
use crate::diagnostics::{ConnectionDiagnostic, DiagnosticSink, FailureKind, TracingSink};
use crate::error::{Result, ShadowSignalError};
use crate::event::ConnectionEvent;
use crate::policy::{ConnectionPolicy, ConnectionStatus, ErrorDisposition};
use crate::protocol::Ack;
use crate::transport::{Connector, Transport};

/// Upper bound on the heartbeat deadline taken from the server handshake.
const MAX_HEARTBEAT: Duration = Duration::from_secs(24 * 60 * 60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the manager, its channel and the driver task.
///
/// `policy` is the single lock guarding connection state; it is never held
/// across an `.await` and never held while user callbacks run.
pub(crate) struct Shared {
    config: ClientConfig,
    endpoint: String,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn DiagnosticSink>,
    policy: Mutex<ConnectionPolicy>,
    listeners: Mutex<Listeners>,
    acks: Mutex<HashMap<u64, AckCallback>>,
    next_ack_id: AtomicU64,
    session_id: Mutex<Option<String>>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: tokio::sync::Mutex<mpsc::Receiver<Outbound>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    attempts: AtomicU64,
    closed: AtomicBool,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(ShadowSignalError::ChannelClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn listeners(&self) -> MutexGuard<'_, Listeners> {
        lock(&self.listeners)
    }

    pub(crate) fn is_connected(&self) -> bool {
        lock(&self.policy).is_connected()
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        lock(&self.session_id).clone()
    }

    /// Start a connection attempt if one is needed and allowed. Never fails
    /// and never waits for the network.
    pub(crate) fn ensure_connected(self: &Arc<Self>) {
        if !self.config.network_enabled || self.closed.load(Ordering::Acquire) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!("no tokio runtime available, connection attempt skipped");
                return;
            }
        };

        {
            let mut policy = lock(&self.policy);
            if !policy.should_attempt(Instant::now()) {
                return;
            }
            if !policy.is_reconnection_enabled() {
                debug!("re-arming automatic reconnection");
            }
            policy.begin_attempt();
        }

        // `shutdown` sets `closed` before taking the handle, so checking it
        // under the driver lock means a spawned task is always joined.
        let mut driver = lock(&self.driver);
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        debug!(url = %self.endpoint, "starting connection driver");
        *driver = Some(runtime.spawn(drive(Arc::clone(self))));
    }

    pub(crate) fn register_ack(&self, callback: AckCallback) -> u64 {
        let id = self.next_ack_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.acks).insert(id, callback);
        id
    }

    /// Buffer a packet for the current or next connection.
    pub(crate) fn enqueue(&self, packet: Packet, ack_id: Option<u64>) -> Result<()> {
        let frame = match Frame::Message(packet).encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.discard_ack(ack_id);
                return Err(e);
            }
        };
        match self.outbound_tx.try_send(Outbound { frame, ack_id }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    capacity = self.config.outbound_buffer_capacity,
                    "outbound buffer full, dropping packet: {}",
                    dropped.frame
                );
                self.discard_ack(ack_id);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.discard_ack(ack_id);
                Err(ShadowSignalError::ChannelClosed)
            }
        }
    }

    fn discard_ack(&self, ack_id: Option<u64>) {
        if let Some(id) = ack_id {
            lock(&self.acks).remove(&id);
        }
    }

    /// Forget callbacks whose request went out on a session that ended
    /// before the server answered.
    fn drop_unanswered(&self, ids: &HashSet<u64>) {
        if ids.is_empty() {
            return;
        }
        let mut acks = lock(&self.acks);
        let before = acks.len();
        acks.retain(|id, _| !ids.contains(id));
        let dropped = before - acks.len();
        if dropped > 0 {
            debug!(dropped, "session ended with unanswered requests");
        }
    }

    // ── Transport callbacks ─────────────────────────────────────────

    fn on_connect(&self, sid: String) {
        if !lock(&self.policy).on_connect() {
            debug!("handshake completed after shutdown");
            return;
        }
        *lock(&self.session_id) = Some(sid.clone());
        info!(url = %self.endpoint, sid = %sid, "connected to game server");
        self.emit_event(ConnectionEvent::Connected { sid });
    }

    /// Record the end of a session and decide whether the driver may retry.
    fn on_disconnect(&self, end: &SessionEnd, attempt: u32) -> Option<Duration> {
        let reason = end.reason();
        *lock(&self.session_id) = None;
        let (was_connected, retry) = {
            let mut policy = lock(&self.policy);
            let was_connected = policy.on_disconnect();
            let retry = if end.reconnects() {
                self.schedule_reconnect(&mut policy, attempt)
            } else {
                None
            };
            (was_connected, retry)
        };
        if was_connected {
            info!(reason = %reason, "disconnected from game server");
        }
        self.emit_event(ConnectionEvent::Disconnected {
            reason: reason.to_string(),
        });
        retry
    }

    /// Apply the suppression policy to a failed attempt and decide whether
    /// the driver may retry.
    fn on_connect_error(&self, error: &ShadowSignalError, attempt: u32) -> Option<Duration> {
        let (disposition, retry) = {
            let mut policy = lock(&self.policy);
            let disposition = policy.on_connect_error(Instant::now());
            let retry = self.schedule_reconnect(&mut policy, attempt);
            (disposition, retry)
        };

        let reported = disposition == ErrorDisposition::Report;
        if reported {
            let diagnostic = ConnectionDiagnostic {
                url: self.endpoint.clone(),
                message: error.to_string(),
                kind: FailureKind::classify(error),
                environment: self.config.environment,
                suppression_window: self.config.suppression_window,
            };
            self.sink.report(&diagnostic);
        }
        self.emit_event(ConnectionEvent::ConnectError {
            message: error.to_string(),
            reported,
        });
        retry
    }

    /// Move to `Reconnecting` if the retry loop is armed and not exhausted.
    /// Runs under the policy lock so no caller-triggered attempt can slip in
    /// between the outcome and the decision.
    fn schedule_reconnect(
        &self,
        policy: &mut ConnectionPolicy,
        attempt: u32,
    ) -> Option<Duration> {
        if !policy.is_reconnection_enabled() || policy.status() == ConnectionStatus::Closed {
            return None;
        }
        let next = attempt.saturating_add(1);
        if self.config.reconnect.is_exhausted(next) {
            info!(attempts = attempt, "automatic reconnection exhausted");
            self.emit_event(ConnectionEvent::ReconnectFailed);
            return None;
        }
        policy.set_status(ConnectionStatus::Reconnecting { attempt: next });
        Some(self.config.reconnect.delay_for_attempt(next))
    }

    fn on_reconnect_attempt(&self, attempt: u32) -> bool {
        let proceed = lock(&self.policy).on_reconnect_attempt();
        if proceed {
            debug!(attempt, "reconnect attempt");
            self.emit_event(ConnectionEvent::ReconnectAttempt { attempt });
        } else {
            debug!(attempt, "server known unavailable, reconnect attempt cancelled");
        }
        proceed
    }

    fn dispatch_event(&self, name: &str, args: &[Value]) {
        let handlers = self.listeners().take_handlers(name);
        if handlers.is_empty() {
            debug!(event = %name, "no listener for event");
        }
        for handler in handlers {
            handler(args);
        }
    }

    fn resolve_ack(&self, id: u64, args: Vec<Value>) {
        let callback = lock(&self.acks).remove(&id);
        match callback {
            Some(callback) => callback(Ack::from_args(args)),
            None => debug!(id, "ack for unknown request"),
        }
    }

    /// Emit a lifecycle event. If the channel is full, log a warning and drop
    /// the event so the driver never blocks on a slow consumer.
    fn emit_event(&self, event: ConnectionEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    fn close(&self) -> bool {
        let already = self.closed.swap(true, Ordering::AcqRel);
        lock(&self.policy).close();
        self.cancel.cancel();
        !already
    }
}

// ── Manager ─────────────────────────────────────────────────────────

/// Owner of the single real-time connection to the game server.
///
/// Construct one per process at startup and share it (`&ConnectionManager`
/// or `Arc<ConnectionManager>`). Dropping it, or calling
/// [`shutdown`](Self::shutdown), closes the connection for every holder of
/// the channel.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    channel: OnceLock<Channel>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl ConnectionManager {
    /// Create a manager that reports connection errors through `tracing`.
    ///
    /// No connection is opened until the channel is first used.
    pub fn new(config: ClientConfig, connector: impl Connector) -> Self {
        Self::with_diagnostic_sink(config, connector, TracingSink)
    }

    /// Create a manager with a custom diagnostic sink.
    pub fn with_diagnostic_sink(
        config: ClientConfig,
        connector: impl Connector,
        sink: impl DiagnosticSink,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer_capacity.max(1));
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            endpoint: config.endpoint(),
            policy: Mutex::new(ConnectionPolicy::new(config.suppression_window)),
            config,
            connector: Arc::new(connector),
            sink: Arc::new(sink),
            listeners: Mutex::new(Listeners::default()),
            acks: Mutex::new(HashMap::new()),
            next_ack_id: AtomicU64::new(0),
            session_id: Mutex::new(None),
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            events_tx,
            attempts: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            driver: Mutex::new(None),
        });
        Self {
            shared,
            channel: OnceLock::new(),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Create a manager from `SHADOW_SIGNAL_URL` / `SHADOW_SIGNAL_ENV` using
    /// the [default connector](crate::transports::DefaultConnector):
    /// long-polling with a WebSocket upgrade, or plain WebSocket when the
    /// `transport-polling` feature is off.
    #[cfg(any(feature = "transport-polling", feature = "transport-websocket"))]
    pub fn from_env() -> Self {
        Self::new(
            ClientConfig::from_env(),
            crate::transports::DefaultConnector::default(),
        )
    }

    /// The shared channel. Allocated on first call; the same instance is
    /// returned for the manager's whole lifetime. Performs no I/O.
    pub fn channel(&self) -> &Channel {
        self.channel
            .get_or_init(|| Channel::new(Arc::clone(&self.shared)))
    }

    /// Take the lifecycle event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        lock(&self.events_rx).take()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared.policy).status()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn is_server_known_unavailable(&self) -> bool {
        lock(&self.shared.policy).is_server_known_unavailable()
    }

    pub fn is_reconnection_enabled(&self) -> bool {
        lock(&self.shared.policy).is_reconnection_enabled()
    }

    /// `(reported, suppressed)` connection error counts.
    pub fn error_counts(&self) -> (u64, u64) {
        lock(&self.shared.policy).error_counts()
    }

    /// Number of connection attempts made so far.
    pub fn connection_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::Relaxed)
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id()
    }

    /// Close the connection and stop the driver.
    ///
    /// Pending acknowledgment callbacks and buffered packets are discarded.
    /// Every later channel operation fails with
    /// [`ShadowSignalError::ChannelClosed`].
    pub async fn shutdown(&self) {
        debug!("ConnectionManager: shutdown requested");
        self.shared.close();

        // Await the driver with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        let task = lock(&self.shared.driver).take();
        if let Some(mut task) = task {
            match tokio::time::timeout(self.shared.config.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection driver terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection driver did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection driver aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.listeners().clear();
        lock(&self.shared.acks).clear();
        *lock(&self.shared.session_id) = None;
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.endpoint)
            .field("status", &self.status())
            .field("server_known_unavailable", &self.is_server_known_unavailable())
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // `Drop` is synchronous so the graceful close cannot be awaited here;
        // cancel and abort the driver instead.
        if self.shared.close() {
            debug!("ConnectionManager dropped without shutdown; aborting driver");
        }
        if let Some(task) = lock(&self.shared.driver).take() {
            task.abort();
        }
        self.shared.listeners().clear();
        lock(&self.shared.acks).clear();
    }
}

// ── Connection driver ───────────────────────────────────────────────

/// Why a session ended, with Socket.IO-compatible reason strings.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    TransportClose,
    TransportError(String),
    PingTimeout,
    ServerDisconnect,
    ClientDisconnect,
}

impl SessionEnd {
    fn reason(&self) -> &str {
        match self {
            SessionEnd::TransportClose => "transport close",
            SessionEnd::TransportError(_) => "transport error",
            SessionEnd::PingTimeout => "ping timeout",
            SessionEnd::ServerDisconnect => "io server disconnect",
            SessionEnd::ClientDisconnect => "io client disconnect",
        }
    }

    /// A deliberate disconnect by either side is not retried automatically.
    fn reconnects(&self) -> bool {
        !matches!(
            self,
            SessionEnd::ServerDisconnect | SessionEnd::ClientDisconnect
        )
    }
}

/// One buffered packet, with the id of the callback awaiting its ack.
struct Outbound {
    frame: String,
    ack_id: Option<u64>,
}

struct Session {
    transport: Box<dyn Transport>,
    handshake: Handshake,
    sid: String,
}

/// Background task: connect, run the session, retry with backoff while
/// reconnection stays armed. Exits when reconnection is disarmed, exhausted,
/// or the manager shuts down.
async fn drive(shared: Arc<Shared>) {
    debug!("connection driver started");
    let cancel = shared.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        shared.attempts.fetch_add(1, Ordering::Relaxed);
        let opened = tokio::select! {
            _ = cancel.cancelled() => break,
            opened = tokio::time::timeout(shared.config.connect_timeout, open_session(&shared)) => {
                opened.unwrap_or(Err(ShadowSignalError::Timeout))
            }
        };

        let retry = match opened {
            Ok(session) => {
                attempt = 0;
                let Session {
                    transport,
                    handshake,
                    sid,
                } = session;
                shared.on_connect(sid);
                let end = run_session(&shared, transport, &handshake, &cancel).await;
                if let SessionEnd::TransportError(e) = &end {
                    error!("transport error: {e}");
                }
                shared.on_disconnect(&end, attempt)
            }
            Err(e) => {
                debug!(attempt, "connection attempt failed: {e}");
                shared.on_connect_error(&e, attempt)
            }
        };

        let Some(delay) = retry else {
            break;
        };
        attempt = attempt.saturating_add(1);
        debug!(attempt, ?delay, "scheduling reconnect");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if !shared.on_reconnect_attempt(attempt) {
            break;
        }
    }

    debug!("connection driver exited");
}

/// Open a transport and complete the Engine.IO and Socket.IO handshakes.
async fn open_session(shared: &Shared) -> Result<Session> {
    let mut transport = shared.connector.connect(&shared.endpoint).await?;
    match handshake(&mut transport).await {
        Ok((handshake, sid)) => Ok(Session {
            transport,
            handshake,
            sid,
        }),
        Err(e) => {
            let _ = transport.close().await;
            Err(e)
        }
    }
}

async fn handshake(transport: &mut Box<dyn Transport>) -> Result<(Handshake, String)> {
    let handshake = loop {
        match next_frame(transport).await? {
            Frame::Open(handshake) => break handshake,
            Frame::Noop => {}
            other => {
                return Err(ShadowSignalError::Protocol(format!(
                    "expected open packet, got {other:?}"
                )))
            }
        }
    };
    debug!(engine_sid = %handshake.sid, "engine handshake complete");

    transport
        .send(Frame::Message(Packet::Connect(None)).encode()?)
        .await?;

    loop {
        match next_frame(transport).await? {
            Frame::Message(packet @ Packet::Connect(_)) => {
                let sid = packet
                    .connect_sid()
                    .map_or_else(|| handshake.sid.clone(), str::to_string);
                return Ok((handshake, sid));
            }
            Frame::Message(Packet::ConnectError { message }) => {
                return Err(ShadowSignalError::ConnectRejected(message));
            }
            Frame::Ping => transport.send(Frame::Pong.encode()?).await?,
            Frame::Close => return Err(ShadowSignalError::TransportClosed),
            other => debug!("ignoring frame during handshake: {other:?}"),
        }
    }
}

async fn next_frame(transport: &mut Box<dyn Transport>) -> Result<Frame> {
    match transport.recv().await {
        Some(Ok(text)) => Frame::decode(&text),
        Some(Err(e)) => Err(e),
        None => Err(ShadowSignalError::TransportClosed),
    }
}

/// Multiplex buffered outbound packets, inbound frames, the ping deadline and
/// shutdown until the session ends.
async fn run_session(
    shared: &Shared,
    mut transport: Box<dyn Transport>,
    handshake: &Handshake,
    cancel: &CancellationToken,
) -> SessionEnd {
    let mut outbound = shared.outbound_rx.lock().await;
    let heartbeat = Duration::from_millis(
        handshake
            .ping_interval
            .saturating_add(handshake.ping_timeout),
    )
    .min(MAX_HEARTBEAT);
    let ping_deadline = tokio::time::sleep(heartbeat);
    tokio::pin!(ping_deadline);
    let mut unanswered = HashSet::new();

    let end = run_session_loop(
        shared,
        &mut transport,
        &mut outbound,
        heartbeat,
        ping_deadline,
        &mut unanswered,
        cancel,
    )
    .await;
    shared.drop_unanswered(&unanswered);
    end
}

async fn run_session_loop(
    shared: &Shared,
    transport: &mut Box<dyn Transport>,
    outbound: &mut mpsc::Receiver<Outbound>,
    heartbeat: Duration,
    mut ping_deadline: std::pin::Pin<&mut tokio::time::Sleep>,
    unanswered: &mut HashSet<u64>,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("shutdown signal received");
                if let Ok(frame) = Frame::Message(Packet::Disconnect).encode() {
                    let _ = transport.send(frame).await;
                }
                let _ = transport.close().await;
                return SessionEnd::ClientDisconnect;
            }

            _ = &mut ping_deadline => {
                warn!("no ping from server within {}ms", heartbeat.as_millis());
                let _ = transport.close().await;
                return SessionEnd::PingTimeout;
            }

            next = outbound.recv() => {
                let Some(Outbound { frame, ack_id }) = next else {
                    let _ = transport.close().await;
                    return SessionEnd::ClientDisconnect;
                };
                unanswered.extend(ack_id);
                if let Err(e) = transport.send(frame).await {
                    return SessionEnd::TransportError(e.to_string());
                }
            }

            incoming = transport.recv() => {
                let text = match incoming {
                    Some(Ok(text)) => text,
                    Some(Err(e)) => return SessionEnd::TransportError(e.to_string()),
                    None => {
                        debug!("transport closed by server");
                        return SessionEnd::TransportClose;
                    }
                };
                match Frame::decode(&text) {
                    Ok(Frame::Ping) => {
                        if let Some(deadline) = Instant::now().checked_add(heartbeat) {
                            ping_deadline.as_mut().reset(deadline);
                        }
                        if let Err(e) = send_frame(transport, &Frame::Pong).await {
                            return SessionEnd::TransportError(e.to_string());
                        }
                    }
                    Ok(Frame::Close) => {
                        return SessionEnd::TransportClose;
                    }
                    Ok(Frame::Message(Packet::Disconnect)) => {
                        let _ = transport.close().await;
                        return SessionEnd::ServerDisconnect;
                    }
                    Ok(Frame::Message(Packet::Event { id, name, args })) => {
                        if let Some(id) = id {
                            debug!(id, event = %name, "server requested an ack; not supported");
                        }
                        shared.dispatch_event(&name, &args);
                    }
                    Ok(Frame::Message(Packet::Ack { id, args })) => {
                        unanswered.remove(&id);
                        shared.resolve_ack(id, args);
                    }
                    Ok(other) => debug!("ignoring frame: {other:?}"),
                    Err(e) => warn!("failed to decode frame: {e} (raw: {text})"),
                }
            }
        }
    }
}

async fn send_frame(transport: &mut Box<dyn Transport>, frame: &Frame) -> Result<()> {
    transport.send(frame.encode()?).await
}
