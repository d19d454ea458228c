//! Engine.IO HTTP long-polling transport using `reqwest`, with an optional
//! upgrade to WebSocket.
//!
//! [`PollingConnector`] opens every session over long-polling, which works
//! through proxies and firewalls that block WebSockets. When the server
//! offers `websocket` in its handshake (and the `transport-websocket`
//! feature is enabled) the connector probes a WebSocket bound to the same
//! session and switches to it before the Socket.IO handshake starts:
//!
//! ```text
//! GET  ?transport=polling            -> 0{"sid":"…","upgrades":["websocket"],…}
//! WS   ?transport=websocket&sid=…    <- 2probe
//!                                    -> 3probe
//!                                    <- 5
//! ```
//!
//! If the probe fails the session simply stays on polling.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-polling` feature is
//! enabled (it is enabled by default).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec::{Frame, Handshake};
use crate::error::{Result, ShadowSignalError};
use crate::transport::{Connector, Transport};

/// Separates packets inside one polling payload.
const RECORD_SEPARATOR: char = '\u{1e}';

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const INCOMING_CAPACITY: usize = 64;

/// Rewrite an Engine.IO endpoint for `transport` (`polling` or
/// `websocket`), mapping the scheme to match and keeping every other query
/// parameter.
pub(crate) fn engine_url(url: &str, transport: &str) -> String {
    let (secure, rest) = match url.split_once("://") {
        Some(("https" | "wss", rest)) => (true, rest),
        Some((_, rest)) => (false, rest),
        None => (false, url),
    };
    let scheme = match (transport == "polling", secure) {
        (true, false) => "http",
        (true, true) => "https",
        (false, false) => "ws",
        (false, true) => "wss",
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("transport=") && !p.starts_with("sid="))
        .collect();
    let transport = format!("transport={transport}");
    params.push(&transport);
    format!("{scheme}://{path}?{}", params.join("&"))
}

fn with_sid(url: &str, sid: &str) -> String {
    format!("{url}&sid={sid}")
}

/// Split a polling response body into Engine.IO packets.
pub(crate) fn split_payload(body: &str) -> Vec<String> {
    body.split(RECORD_SEPARATOR)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn request_error(e: reqwest::Error) -> ShadowSignalError {
    let kind = if e.is_timeout() {
        std::io::ErrorKind::TimedOut
    } else if e.is_connect() {
        std::io::ErrorKind::ConnectionRefused
    } else {
        std::io::ErrorKind::Other
    };
    ShadowSignalError::Io(std::io::Error::new(kind, e))
}

async fn get_payload(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let response = client.get(url).send().await.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ShadowSignalError::TransportReceive(format!(
            "poll returned HTTP {status}"
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|e| ShadowSignalError::TransportReceive(e.to_string()))?;
    Ok(split_payload(&body))
}

/// Open an Engine.IO session over polling. Returns the handshake and every
/// packet of the first payload, the open packet included.
async fn open(client: &reqwest::Client, url: &str) -> Result<(Handshake, VecDeque<String>)> {
    let packets: VecDeque<String> = get_payload(client, url).await?.into();
    match packets.front().map(|p| Frame::decode(p)) {
        Some(Ok(Frame::Open(handshake))) => Ok((handshake, packets)),
        Some(Ok(other)) => Err(ShadowSignalError::Protocol(format!(
            "expected open packet, got {other:?}"
        ))),
        Some(Err(e)) => Err(e),
        None => Err(ShadowSignalError::Protocol("empty handshake response".into())),
    }
}

/// Long-poll until the server closes the session or the receiver is gone.
async fn poll_loop(client: reqwest::Client, url: String, tx: mpsc::Sender<Result<String>>) {
    loop {
        let packets = match get_payload(&client, &url).await {
            Ok(packets) => packets,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        for packet in packets {
            let close = packet == "1";
            if tx.send(Ok(packet)).await.is_err() || close {
                return;
            }
        }
    }
}

/// A [`Transport`] over Engine.IO HTTP long-polling.
///
/// A background task keeps one `GET` outstanding and feeds received
/// packets into a channel; every [`send`](Transport::send) is one `POST`.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) only reads from the internal channel, so it is
/// cancel-safe. Packets already fetched are never lost.
#[derive(Debug)]
pub struct PollingTransport {
    client: reqwest::Client,
    url: String,
    pending: VecDeque<String>,
    incoming: mpsc::Receiver<Result<String>>,
    poller: JoinHandle<()>,
    closed: bool,
}

impl PollingTransport {
    /// Open a polling session at `url` (an `http(s)` or `ws(s)` Engine.IO
    /// endpoint; the scheme and `transport` parameter are rewritten).
    ///
    /// The first frame returned by [`recv`](Transport::recv) is the
    /// Engine.IO open packet.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowSignalError::Io`] if the server is unreachable and
    /// [`ShadowSignalError::Protocol`] if it does not answer with an open
    /// packet.
    pub async fn connect(client: reqwest::Client, url: &str) -> Result<Self> {
        let url = engine_url(url, "polling");
        let (handshake, packets) = open(&client, &url).await?;
        Ok(Self::start(client, with_sid(&url, &handshake.sid), packets))
    }

    fn start(client: reqwest::Client, url: String, pending: VecDeque<String>) -> Self {
        debug!(url = %url, "polling session open");
        let (tx, incoming) = mpsc::channel(INCOMING_CAPACITY);
        let poller = tokio::spawn(poll_loop(client.clone(), url.clone(), tx));
        Self {
            client,
            url,
            pending,
            incoming,
            poller,
            closed: false,
        }
    }

    async fn post(&self, body: String) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| ShadowSignalError::TransportSend(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ShadowSignalError::TransportSend(format!(
                "post returned HTTP {status}"
            )))
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(ShadowSignalError::TransportClosed);
        }
        self.post(frame).await
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        if let Some(packet) = self.pending.pop_front() {
            return Some(Ok(packet));
        }
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.poller.abort();
        self.post(
            Frame::Close
                .encode()
                .unwrap_or_else(|_| "1".to_string()),
        )
        .await
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

// ── Upgrade ─────────────────────────────────────────────────────────

#[cfg(feature = "transport-websocket")]
mod upgrade {
    use super::*;
    use crate::transports::websocket::WebSocketTransport;

    /// A WebSocket that took over a polling session. Replays the packets
    /// received over polling before reading from the socket.
    #[derive(Debug)]
    pub(super) struct UpgradedTransport {
        pub(super) pending: VecDeque<String>,
        pub(super) socket: WebSocketTransport,
    }

    #[async_trait]
    impl Transport for UpgradedTransport {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.socket.send(frame).await
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            if let Some(packet) = self.pending.pop_front() {
                return Some(Ok(packet));
            }
            self.socket.recv().await
        }

        async fn close(&mut self) -> Result<()> {
            self.socket.close().await
        }
    }

    /// Open a WebSocket bound to the polling session at `url` and complete
    /// the probe exchange.
    pub(super) async fn probe(url: &str) -> Result<WebSocketTransport> {
        let mut socket = WebSocketTransport::connect(url).await?;
        socket.send("2probe".to_string()).await?;
        loop {
            match socket.recv().await {
                Some(Ok(text)) if text == "3probe" => break,
                // The server may flush a noop to the old transport meanwhile.
                Some(Ok(text)) if text == "6" => {}
                Some(Ok(other)) => {
                    let _ = socket.close().await;
                    return Err(ShadowSignalError::Protocol(format!(
                        "unexpected probe reply {other:?}"
                    )));
                }
                Some(Err(e)) => return Err(e),
                None => return Err(ShadowSignalError::TransportClosed),
            }
        }
        socket.send(Frame::Upgrade.encode()?).await?;
        Ok(socket)
    }
}

/// Opens every session over long-polling and upgrades it to WebSocket when
/// the server allows it.
///
/// Takes the same endpoint as [`WebSocketConnector`](crate::WebSocketConnector)
/// and derives the polling URL from it.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "transport-websocket"), allow(dead_code))]
pub struct PollingConnector {
    client: reqwest::Client,
    upgrade: bool,
    probe_timeout: Duration,
}

impl PollingConnector {
    /// Connector sharing an existing HTTP client.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            upgrade: cfg!(feature = "transport-websocket"),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Whether to try upgrading to WebSocket. Defaults to `true` when the
    /// `transport-websocket` feature is enabled; without it the setting has
    /// no effect.
    #[must_use]
    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    /// Deadline for the WebSocket probe. Defaults to **3 seconds**; keep it
    /// below the manager's connect timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[cfg(feature = "transport-websocket")]
    async fn try_upgrade(
        &self,
        url: &str,
        handshake: &Handshake,
    ) -> Option<crate::transports::websocket::WebSocketTransport> {
        if !self.upgrade || !handshake.upgrades.iter().any(|t| t == "websocket") {
            return None;
        }
        let url = with_sid(&engine_url(url, "websocket"), &handshake.sid);
        match tokio::time::timeout(self.probe_timeout, upgrade::probe(&url)).await {
            Ok(Ok(socket)) => Some(socket),
            Ok(Err(e)) => {
                debug!("websocket upgrade failed, staying on polling: {e}");
                None
            }
            Err(_) => {
                debug!("websocket probe timed out, staying on polling");
                None
            }
        }
    }
}

impl Default for PollingConnector {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Connector for PollingConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let polling = engine_url(url, "polling");
        let (handshake, packets) = open(&self.client, &polling).await?;
        debug!(engine_sid = %handshake.sid, upgrades = ?handshake.upgrades, "polling handshake");

        #[cfg(feature = "transport-websocket")]
        if let Some(socket) = self.try_upgrade(url, &handshake).await {
            debug!(engine_sid = %handshake.sid, "upgraded to websocket");
            return Ok(Box::new(upgrade::UpgradedTransport {
                pending: packets,
                socket,
            }));
        }

        Ok(Box::new(PollingTransport::start(
            self.client.clone(),
            with_sid(&polling, &handshake.sid),
            packets,
        )))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::manager::ConnectionManager;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OPEN: &str =
        r#"0{"sid":"eio1","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000}"#;

    #[test]
    fn engine_url_switches_scheme_and_transport() {
        let ws = "ws://localhost:4001/socket.io/?EIO=4&transport=websocket";
        assert_eq!(
            engine_url(ws, "polling"),
            "http://localhost:4001/socket.io/?EIO=4&transport=polling"
        );
        assert_eq!(
            engine_url("https://play.example.com/socket.io/?EIO=4&sid=x", "websocket"),
            "wss://play.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            with_sid(&engine_url("localhost:4001/socket.io/", "polling"), "abc"),
            "http://localhost:4001/socket.io/?transport=polling&sid=abc"
        );
    }

    #[test]
    fn payload_splits_on_record_separator() {
        assert_eq!(
            split_payload("40{\"sid\":\"a\"}\u{1e}42[\"timer-tick\",5]\u{1e}"),
            vec![r#"40{"sid":"a"}"#.to_string(), r#"42["timer-tick",5]"#.to_string()]
        );
        assert!(split_payload("").is_empty());
    }

    /// A polling-only Engine.IO server: answers the handshake, hands out
    /// `first` on the first poll, then idles with noops.
    async fn polling_server(first: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/socket.io/"))
            .and(query_param_is_missing("sid"))
            .respond_with(ResponseTemplate::new(200).set_body_string(OPEN))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("transport", "polling"))
            .and(query_param("sid", "eio1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(first))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("transport", "polling"))
            .and(query_param("sid", "eio1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("6")
                    .set_delay(Duration::from_millis(100)),
            )
            .with_priority(10)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("sid", "eio1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        server
    }

    async fn posted(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    fn endpoint(server: &MockServer) -> String {
        ClientConfig::new(server.uri()).endpoint()
    }

    async fn eventually<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    /// Poll the mock until the client has posted `count` bodies.
    async fn posted_at_least(server: &MockServer, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let bodies = posted(server).await;
                if bodies.len() >= count {
                    return bodies;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client did not post in time")
    }

    #[tokio::test]
    async fn transport_replays_handshake_then_polls() {
        let server = polling_server("40{\"sid\":\"s\"}\u{1e}2").await;
        let mut transport = PollingTransport::connect(reqwest::Client::new(), &endpoint(&server))
            .await
            .unwrap();

        assert_eq!(transport.recv().await.unwrap().unwrap(), OPEN);
        assert_eq!(transport.recv().await.unwrap().unwrap(), r#"40{"sid":"s"}"#);
        assert_eq!(transport.recv().await.unwrap().unwrap(), "2");

        transport.send("3".to_string()).await.unwrap();
        transport.close().await.unwrap();
        assert!(matches!(
            transport.send("3".to_string()).await,
            Err(ShadowSignalError::TransportClosed)
        ));
        assert_eq!(posted(&server).await, vec!["3".to_string(), "1".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_refused_io_error() {
        let err = PollingConnector::default()
            .connect("ws://127.0.0.1:1/socket.io/?EIO=4&transport=websocket")
            .await
            .err()
            .unwrap();
        match err {
            ShadowSignalError::Io(io) => {
                assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn manager_falls_back_to_polling_when_websocket_is_refused() {
        // The mock speaks plain HTTP only, so the WebSocket probe fails.
        let server = polling_server(r#"40{"sid":"sock1"}"#).await;
        let config = ClientConfig::new(server.uri());
        let manager = ConnectionManager::new(config, PollingConnector::default());

        manager.channel().emit("hello", vec![]).unwrap();
        eventually(|| manager.session_id().as_deref() == Some("sock1")).await;
        assert_eq!(
            posted_at_least(&server, 2).await,
            vec!["40".to_string(), r#"42["hello"]"#.to_string()]
        );

        manager.shutdown().await;
        assert_eq!(
            posted(&server).await,
            vec![
                "40".to_string(),
                r#"42["hello"]"#.to_string(),
                "41".to_string(),
                "1".to_string(),
            ]
        );
    }

    #[cfg(feature = "transport-websocket")]
    mod upgrade_tests {
        use super::*;
        use futures_util::{SinkExt, StreamExt};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};
        use tokio_tungstenite::tungstenite::protocol::Message;

        /// Serves the polling handshake over plain HTTP and the upgraded
        /// session over WebSocket on the same port. Records what the
        /// WebSocket side received.
        async fn upgrading_server() -> (String, Arc<Mutex<Vec<String>>>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let record = Arc::clone(&seen);
            tokio::spawn(async move {
                loop {
                    let (tcp, _) = listener.accept().await.unwrap();
                    tokio::spawn(handle(tcp, Arc::clone(&record)));
                }
            });
            (format!("http://{addr}"), seen)
        }

        async fn request_line(tcp: &TcpStream) -> String {
            let mut buf = [0u8; 2048];
            loop {
                let n = tcp.peek(&mut buf).await.unwrap();
                if n == 0 {
                    return String::new();
                }
                let head = String::from_utf8_lossy(&buf[..n]).into_owned();
                if head.contains("\r\n") {
                    return head.lines().next().unwrap_or_default().to_string();
                }
            }
        }

        async fn handle(mut tcp: TcpStream, seen: Arc<Mutex<Vec<String>>>) {
            if request_line(&tcp).await.contains("transport=websocket") {
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let text = text.to_string();
                    seen.lock().unwrap().push(text.clone());
                    let reply = match text.as_str() {
                        "2probe" => Some("3probe".to_string()),
                        "40" => Some(r#"40{"sid":"sock-ws"}"#.to_string()),
                        t if t.starts_with("420") => Some(
                            r#"430[{"success":true,"room":{"code":"WS01","players":[]}}]"#
                                .to_string(),
                        ),
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        ws.send(Message::Text(reply.into())).await.unwrap();
                    }
                }
                return;
            }

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&request).contains("\r\n\r\n") {
                let n = tcp.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=UTF-8\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{OPEN}",
                OPEN.len()
            );
            tcp.write_all(response.as_bytes()).await.unwrap();
            let _ = tcp.shutdown().await;
        }

        #[tokio::test]
        async fn manager_upgrades_polling_session_to_websocket() {
            let (url, seen) = upgrading_server().await;
            let manager = ConnectionManager::new(ClientConfig::new(url), PollingConnector::default());

            let ack = manager.channel().emit_ack("create-room", vec![]).unwrap();
            let ack = tokio::time::timeout(Duration::from_secs(5), ack)
                .await
                .unwrap()
                .unwrap();

            assert_eq!(ack.room_code(), Some("WS01"));
            assert_eq!(manager.session_id().as_deref(), Some("sock-ws"));
            assert_eq!(
                seen.lock().unwrap()[..3].to_vec(),
                vec!["2probe".to_string(), "5".to_string(), "40".to_string()]
            );
            manager.shutdown().await;
        }

        #[tokio::test]
        async fn upgrade_can_be_disabled() {
            let server = polling_server(r#"40{"sid":"sock1"}"#).await;
            let connector = PollingConnector::default().with_upgrade(false);
            let mut transport = connector.connect(&endpoint(&server)).await.unwrap();
            assert_eq!(transport.recv().await.unwrap().unwrap(), OPEN);
            assert_eq!(transport.recv().await.unwrap().unwrap(), r#"40{"sid":"sock1"}"#);
        }
    }
}
