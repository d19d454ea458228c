//! # Custom Transport Example
//!
//! Shows how to implement the [`Connector`] and [`Transport`] traits with a
//! simple in-process loopback channel. This is useful for:
//!
//! - **Testing** — exercise game logic without a real server
//! - **Custom backends** — adapt any I/O layer (HTTP long-polling, QUIC, ...)
//!
//! The "server" half answers the Engine.IO / Socket.IO handshake by hand and
//! acknowledges one `create-room` request.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use async_trait::async_trait;
use shadow_signal_client::{
    ClientConfig, ConnectionEvent, ConnectionManager, Connector, ShadowSignalError, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// Client half: implements [`Transport`].
pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: read what the client sent, push frames back.
pub struct LoopbackServer {
    pub rx: mpsc::UnboundedReceiver<String>,
    pub tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement Transport and Connector
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, frame: String) -> Result<(), ShadowSignalError> {
        self.tx
            .send(frame)
            .map_err(|e| ShadowSignalError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, ShadowSignalError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ShadowSignalError> {
        Ok(())
    }
}

/// Hands out one loopback transport per connection attempt and passes the
/// matching server half to the fake server task.
struct LoopbackConnector {
    servers: mpsc::UnboundedSender<LoopbackServer>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ShadowSignalError> {
        tracing::info!("connector asked for {url}");
        let (transport, server) = loopback_pair();
        self.servers
            .send(server)
            .map_err(|_| ShadowSignalError::TransportClosed)?;
        Ok(Box::new(transport))
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: A fake server speaking just enough Socket.IO
// ─────────────────────────────────────────────────────────────────────

async fn serve(mut server: LoopbackServer) {
    let open = r#"0{"sid":"loop","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if server.tx.send(open.to_string()).is_err() {
        return;
    }
    while let Some(frame) = server.rx.recv().await {
        tracing::info!("server received: {frame}");
        let reply = if frame == "40" {
            Some(r#"40{"sid":"loop-socket"}"#.to_string())
        } else if let Some(rest) = frame.strip_prefix("42") {
            // `42<id>["create-room"]` -> `43<id>[{...}]`
            let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
            (!id.is_empty()).then(|| format!(r#"43{id}[{{"success":true,"room":{{"code":"LOOP","players":[]}}}}]"#))
        } else {
            None
        };
        if let Some(reply) = reply {
            if server.tx.send(reply).is_err() {
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (servers_tx, mut servers_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(server) = servers_rx.recv().await {
            tokio::spawn(serve(server));
        }
    });

    let manager = ConnectionManager::new(
        ClientConfig::new("loopback://game"),
        LoopbackConnector {
            servers: servers_tx,
        },
    );
    let mut events = manager.take_events().ok_or("events already taken")?;

    let ack = manager.channel().emit_ack("create-room", vec![])?;
    // Nothing has touched the network until the line above.
    if let Some(ConnectionEvent::Connected { sid }) = events.recv().await {
        tracing::info!("connected as {sid}");
    }

    let ack = ack.await?;
    let room = ack.room().transpose()?;
    tracing::info!("room created: {:?}", room.map(|r| r.code));

    manager.shutdown().await;
    Ok(())
}
