#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Shadow Signal client integration tests.
//!
//! Provides a [`ScriptedConnector`] whose connection attempts follow a
//! script (refuse, hang, accept), a channel-based [`MockTransport`] that
//! plays the server side of the Socket.IO handshake, and a
//! [`RecordingSink`] collecting diagnostics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shadow_signal_client::codec::{Frame, Handshake, Packet};
use shadow_signal_client::{
    ClientConfig, ConnectionDiagnostic, Connector, DiagnosticSink, ReconnectConfig,
    ShadowSignalError, Transport,
};
use tokio::sync::mpsc;

pub const TEST_URL: &str = "http://localhost:4001";

/// Config with deterministic backoff (no jitter).
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_URL).with_reconnect(ReconnectConfig {
        randomization_factor: 0.0,
        ..ReconnectConfig::default()
    })
}

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Let spawned tasks run until they block. Time is paused in these tests,
/// so this also advances the clock by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ── Server replies ──────────────────────────────────────────────────

/// Computes the ack arguments for an event the client sent with an ack id.
/// Returning `None` leaves the request unanswered.
pub type Responder = Arc<dyn Fn(&str, &[Value]) -> Option<Vec<Value>> + Send + Sync>;

pub fn responder<F>(f: F) -> Responder
where
    F: Fn(&str, &[Value]) -> Option<Vec<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ── MockTransport ───────────────────────────────────────────────────

/// Client half of an in-process connection.
///
/// Plays the server side of the handshake: the Engine.IO open packet is
/// queued up front and the Socket.IO connect request is answered with a
/// connect ack. Events carrying an ack id are answered by the responder.
pub struct MockTransport {
    pending: VecDeque<String>,
    from_server: mpsc::UnboundedReceiver<String>,
    received: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    responder: Option<Responder>,
    sid: String,
    reject_connect: Option<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), ShadowSignalError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ShadowSignalError::TransportClosed);
        }
        self.received.lock().unwrap().push(frame.clone());
        match Frame::decode(&frame) {
            Ok(Frame::Message(Packet::Connect(_))) => {
                let reply = match &self.reject_connect {
                    Some(message) => Packet::ConnectError {
                        message: message.clone(),
                    },
                    None => Packet::Connect(Some(serde_json::json!({ "sid": self.sid }))),
                };
                self.pending
                    .push_back(Frame::Message(reply).encode().unwrap());
            }
            Ok(Frame::Message(Packet::Event {
                id: Some(id),
                name,
                args,
            })) => {
                if let Some(args) = self.responder.as_ref().and_then(|r| r(&name, &args)) {
                    self.pending
                        .push_back(Frame::Message(Packet::Ack { id, args }).encode().unwrap());
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ShadowSignalError>> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(Ok(frame));
        }
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ShadowSignalError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Server half of one accepted connection.
#[derive(Clone)]
pub struct ServerHandle {
    to_client: Arc<StdMutex<Option<mpsc::UnboundedSender<String>>>>,
    received: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Push a raw frame to the client.
    pub fn push(&self, frame: &str) {
        if let Some(tx) = self.to_client.lock().unwrap().as_ref() {
            let _ = tx.send(frame.to_string());
        }
    }

    /// Push a Socket.IO event to the client.
    pub fn push_event(&self, name: &str, args: Vec<Value>) {
        let frame = Frame::Message(Packet::Event {
            id: None,
            name: name.to_string(),
            args,
        })
        .encode()
        .unwrap();
        self.push(&frame);
    }

    /// Drop the connection from the server side.
    pub fn hang_up(&self) {
        self.to_client.lock().unwrap().take();
    }

    /// Every frame the client sent on this connection, handshake included.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Frames the client sent after the Socket.IO connect request.
    pub fn received_events(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter(|f| f.starts_with("42"))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ── ScriptedConnector ───────────────────────────────────────────────

/// Outcome of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Fail immediately with "connection refused".
    Refuse,
    /// Never complete; the manager's connect timeout fires.
    Hang,
    /// Open a [`MockTransport`].
    Accept,
    /// Open a transport whose Socket.IO connect is refused.
    RejectConnect(String),
}

struct Inner {
    steps: StdMutex<VecDeque<Step>>,
    fallback: StdMutex<Step>,
    attempts: AtomicUsize,
    responder: StdMutex<Option<Responder>>,
    ping: StdMutex<(u64, u64)>,
    servers: StdMutex<Vec<ServerHandle>>,
}

/// A [`Connector`] driven by a script of [`Step`]s. Clones share state, so
/// a test keeps one clone and hands the other to the manager.
#[derive(Clone)]
pub struct ScriptedConnector {
    inner: Arc<Inner>,
}

impl ScriptedConnector {
    /// Connector that answers every attempt with `fallback`.
    pub fn new(fallback: Step) -> Self {
        Self {
            inner: Arc::new(Inner {
                steps: StdMutex::new(VecDeque::new()),
                fallback: StdMutex::new(fallback),
                attempts: AtomicUsize::new(0),
                responder: StdMutex::new(None),
                // Long heartbeat so paused-clock tests do not trip it.
                ping: StdMutex::new((3_600_000, 3_600_000)),
                servers: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Queue steps consumed before the fallback applies.
    pub fn script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.inner.steps.lock().unwrap().extend(steps);
        self
    }

    pub fn with_responder(self, responder: Responder) -> Self {
        *self.inner.responder.lock().unwrap() = Some(responder);
        self
    }

    pub fn with_heartbeat(self, ping_interval_ms: u64, ping_timeout_ms: u64) -> Self {
        *self.inner.ping.lock().unwrap() = (ping_interval_ms, ping_timeout_ms);
        self
    }

    pub fn set_fallback(&self, step: Step) {
        *self.inner.fallback.lock().unwrap() = step;
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn servers(&self) -> Vec<ServerHandle> {
        self.inner.servers.lock().unwrap().clone()
    }

    pub fn server(&self, index: usize) -> ServerHandle {
        self.servers()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no connection #{index} was accepted"))
    }

    fn open(&self, reject_connect: Option<String>) -> MockTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let index = self.inner.servers.lock().unwrap().len();
        let (ping_interval, ping_timeout) = *self.inner.ping.lock().unwrap();

        let open = Frame::Open(Handshake {
            sid: format!("eio-{index}"),
            upgrades: vec![],
            ping_interval,
            ping_timeout,
            max_payload: Some(1_000_000),
        })
        .encode()
        .unwrap();

        self.inner.servers.lock().unwrap().push(ServerHandle {
            to_client: Arc::new(StdMutex::new(Some(tx))),
            received: Arc::clone(&received),
            closed: Arc::clone(&closed),
        });

        MockTransport {
            pending: VecDeque::from([open]),
            from_server: rx,
            received,
            closed,
            responder: self.inner.responder.lock().unwrap().clone(),
            sid: format!("sock-{index}"),
            reject_connect,
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, ShadowSignalError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self
            .inner
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.inner.fallback.lock().unwrap().clone());
        let transport = match step {
            Step::Refuse => {
                return Err(ShadowSignalError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )))
            }
            Step::Hang => return std::future::pending().await,
            Step::Accept => self.open(None),
            Step::RejectConnect(message) => self.open(Some(message)),
        };
        Ok(Box::new(transport))
    }
}

// ── RecordingSink ───────────────────────────────────────────────────

/// Diagnostic sink that records every report. Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    reports: Arc<StdMutex<Vec<ConnectionDiagnostic>>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<ConnectionDiagnostic> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &ConnectionDiagnostic) {
        self.reports.lock().unwrap().push(diagnostic.clone());
    }
}
