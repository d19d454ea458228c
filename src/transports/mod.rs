//! Built-in transports.
//!
//! Enable the corresponding Cargo feature to pull in a transport:
//!
//! | Feature                | Transport              | Connector              |
//! |------------------------|------------------------|------------------------|
//! | `transport-polling`    | [`PollingTransport`]   | [`PollingConnector`]   |
//! | `transport-websocket`  | [`WebSocketTransport`] | [`WebSocketConnector`] |
//!
//! With both features enabled (the default), [`PollingConnector`] opens
//! sessions over long-polling and upgrades them to WebSocket. Any other
//! backend can be plugged in by implementing [`Connector`](crate::Connector).

#[cfg(feature = "transport-polling")]
pub mod polling;
#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-polling")]
pub use polling::{PollingConnector, PollingTransport};
#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};

/// Connector used by [`ConnectionManager::from_env`](crate::ConnectionManager::from_env).
#[cfg(feature = "transport-polling")]
pub type DefaultConnector = PollingConnector;

/// Connector used by [`ConnectionManager::from_env`](crate::ConnectionManager::from_env).
#[cfg(all(feature = "transport-websocket", not(feature = "transport-polling")))]
pub type DefaultConnector = WebSocketConnector;
