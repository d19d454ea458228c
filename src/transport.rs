//! Transport abstraction for the Shadow Signal event channel.
//!
//! The [`Transport`] trait is a bidirectional text frame channel between the
//! client and the game server. Every frame is one Engine.IO packet (see
//! [`codec`](crate::codec)); implementations handle framing of the underlying
//! medium themselves (WebSocket frames, in-memory channels, ...).
//!
//! # Connection Setup
//!
//! The [`ConnectionManager`](crate::ConnectionManager) opens connections
//! lazily and may open a new one after every disconnect, so it does not take
//! a transport directly. It takes a [`Connector`]: a factory that produces a
//! freshly connected [`Transport`] for a URL on demand.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use shadow_signal_client::error::ShadowSignalError;
//! use shadow_signal_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), ShadowSignalError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ShadowSignalError>> {
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ShadowSignalError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ShadowSignalError> {
//!         Ok(Box::new(MyTransport { /* ... */ }))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ShadowSignalError;

/// A bidirectional text frame transport.
///
/// Each call to [`send`](Transport::send) transmits one complete frame and
/// each call to [`recv`](Transport::recv) returns one complete frame.
///
/// # Object Safety
///
/// This trait is object-safe; the manager stores connections as
/// `Box<dyn Transport>`.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data. Channel-based implementations (e.g., wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowSignalError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, frame: String) -> Result<(), ShadowSignalError>;

    /// Receive the next frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete frame was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, ShadowSignalError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), ShadowSignalError>;
}

/// Opens new [`Transport`] connections on demand.
///
/// The manager calls [`connect`](Connector::connect) once per connection
/// attempt, wrapped in the configured connect timeout. Failures are treated
/// as connection errors and go through the suppression policy; they are never
/// returned to channel callers.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or refuses the
    /// connection.
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ShadowSignalError>;
}
