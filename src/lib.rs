//! # Shadow Signal Client
//!
//! Resilient real-time connection manager for the Shadow Signal party game
//! server.
//!
//! The crate gives an application one shared [`Channel`] to the game server
//! that can be handed out before the server is reachable. Connections are
//! opened lazily, reconnected with bounded backoff, and connection errors are
//! reported at most once per suppression window, so an unreachable server in
//! development produces one hint instead of a flood of errors.
//!
//! ## Features
//!
//! - **Lazy** — constructing the manager or the channel does no I/O
//! - **Quiet failure** — one diagnostic per window through a [`DiagnosticSink`]
//! - **Buffered** — packets emitted while connecting are flushed in order
//! - **Fallback-capable** — the default connector opens sessions over HTTP
//!   long-polling and upgrades them to WebSocket once the server allows it
//! - **Transport-agnostic** — implement [`Connector`] and [`Transport`] for any
//!   other backend
//! - **Typed game calls** — `create_room`, `join_room`, `start_game`,
//!   `submit_vote` and decoded [`ServerEvent`] pushes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-polling")]
//! # async fn example() -> Result<(), shadow_signal_client::ShadowSignalError> {
//! use shadow_signal_client::{ConnectionManager, RoomCode, ServerEvent};
//!
//! let manager = ConnectionManager::from_env();
//! let channel = manager.channel();
//!
//! channel.on_server_event(|event| {
//!     if let ServerEvent::TimerTick(left) = event {
//!         println!("{left}s left");
//!     }
//! })?;
//!
//! channel.join_room(&RoomCode::new("ab12"), "Ada", |ack| {
//!     match ack.rejection() {
//!         None => println!("joined"),
//!         Some(reason) => println!("join failed: {reason}"),
//!     }
//! })?;
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod channel;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod game;
pub mod manager;
pub mod policy;
pub mod protocol;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use backoff::ReconnectConfig;
pub use channel::{Channel, ListenerId};
pub use config::{ClientConfig, Environment};
pub use diagnostics::{ConnectionDiagnostic, DiagnosticSink, FailureKind, TracingSink};
pub use error::ShadowSignalError;
pub use event::ConnectionEvent;
pub use game::RoomCode;
pub use manager::ConnectionManager;
pub use policy::ConnectionStatus;
pub use protocol::{Ack, ClientEvent, GameMode, Player, Room, RoomStatus, ServerEvent};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-polling")]
pub use transports::{PollingConnector, PollingTransport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
