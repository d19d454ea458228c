//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries Engine.IO text frames over a WebSocket
//! connection; [`WebSocketConnector`] opens one per connection attempt for
//! the [`ConnectionManager`](crate::ConnectionManager). Both `ws://` and
//! `wss://` URLs are supported, with TLS handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), shadow_signal_client::ShadowSignalError> {
//! use shadow_signal_client::{Transport, WebSocketTransport};
//!
//! let url = "ws://localhost:4001/socket.io/?EIO=4&transport=websocket";
//! let mut transport = WebSocketTransport::connect(url).await?;
//!
//! // Engine.IO open packet
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("handshake: {frame}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ShadowSignalError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
///
/// Made public so that callers can construct a [`WebSocketTransport`] from an
/// existing stream via [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// For advanced use-cases (custom TLS, proxy, headers) construct the stream
/// yourself and use [`WebSocketTransport::from_stream`].
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not consume or lose any frames,
/// making it safe to use inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowSignalError::Io`] if the URL is invalid or the connection
    /// cannot be established. When the underlying error is an I/O error its
    /// [`ErrorKind`](std::io::ErrorKind) is preserved; all other errors are
    /// mapped to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, ShadowSignalError> {
        tracing::debug!(url = %url, "opening WebSocket");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ShadowSignalError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::debug!(url = %url, "WebSocket open");

        Ok(Self::from_stream(stream))
    }

    /// Create a [`WebSocketTransport`] from an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), ShadowSignalError> {
        if self.closed {
            return Err(ShadowSignalError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| ShadowSignalError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ShadowSignalError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ShadowSignalError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // Engine.IO heartbeats are text frames; tungstenite answers
                // WebSocket-level pings itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("binary attachments are not supported, skipping frame");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ShadowSignalError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ShadowSignalError::TransportSend(e.to_string()))
    }
}

/// Opens a [`WebSocketTransport`] for every connection attempt.
///
/// The manager applies its own connect timeout around
/// [`connect`](Connector::connect).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ShadowSignalError> {
        let transport = WebSocketTransport::connect(url).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::manager::ConnectionManager;
    use crate::policy::ConnectionStatus;
    use std::time::Duration;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, ShadowSignalError::Io(_)));
    }

    #[tokio::test]
    async fn connector_reports_unreachable_host() {
        let err = WebSocketConnector
            .connect("ws://127.0.0.1:1/socket.io/?EIO=4&transport=websocket")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ShadowSignalError::Io(_)));
    }

    // ── Mock-server helpers ──────────────────────────────────────────────

    use tokio::net::TcpListener;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("2".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "2");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("2".to_string()).await.unwrap_err();
        assert!(matches!(err, ShadowSignalError::TransportClosed));
    }

    #[tokio::test]
    async fn manager_connects_over_websocket() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(
                r#"0{"sid":"eio1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#
                    .into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) if text.as_str() == "40" => {
                        ws.send(Message::Text(r#"40{"sid":"sock1"}"#.into()))
                            .await
                            .unwrap();
                    }
                    Message::Text(text) if text.as_str().starts_with("420") => {
                        ws.send(Message::Text(r#"430[{"success":true,"room":{"code":"AB12","players":[]}}]"#.into()))
                            .await
                            .unwrap();
                    }
                    _ => {}
                }
            }
        })
        .await;

        let manager = ConnectionManager::new(ClientConfig::new(url), WebSocketConnector);
        let ack = manager
            .channel()
            .emit_ack("create-room", vec![])
            .unwrap();
        let ack = tokio::time::timeout(Duration::from_secs(5), ack)
            .await
            .unwrap()
            .unwrap();

        assert!(ack.success);
        assert_eq!(ack.room_code(), Some("AB12"));
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert_eq!(manager.session_id().as_deref(), Some("sock1"));
        manager.shutdown().await;
    }
}
