//! Connection lifecycle events.

/// Lifecycle notifications emitted by the [`ConnectionManager`](crate::ConnectionManager).
///
/// Delivered on the bounded channel returned by
/// [`take_events`](crate::ConnectionManager::take_events). When the consumer
/// falls behind, events are dropped with a warning rather than stalling the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The server acknowledged the connection.
    Connected {
        /// Session id assigned by the server.
        sid: String,
    },
    /// An established connection ended.
    Disconnected {
        /// Socket.IO-style reason (`"transport close"`, `"ping timeout"`, ...).
        reason: String,
    },
    /// A connection attempt failed.
    ConnectError {
        message: String,
        /// Whether this error was reported to the diagnostic sink or
        /// suppressed inside the current window.
        reported: bool,
    },
    /// An automatic reconnect attempt is about to start.
    ReconnectAttempt { attempt: u32 },
    /// Automatic reconnection gave up after the configured attempts.
    ReconnectFailed,
}
