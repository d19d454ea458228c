//! Error types for the Shadow Signal client.

use thiserror::Error;

/// Errors that can occur when using the Shadow Signal client.
///
/// Transport-level failures (`Io`, `Timeout`, `ConnectRejected`, ...) are
/// absorbed by the [`ConnectionManager`](crate::ConnectionManager) and only
/// reach user code through the diagnostic sink. Channel operations return an
/// error only for [`ChannelClosed`](ShadowSignalError::ChannelClosed) and for
/// payloads that cannot be serialized.
#[derive(Debug, Error)]
pub enum ShadowSignalError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame did not follow the event framing rules.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The channel was used after the manager was shut down.
    #[error("channel is closed")]
    ChannelClosed,

    /// A connection attempt did not complete within the connect timeout.
    #[error("timeout")]
    Timeout,

    /// The server refused the namespace connection.
    #[error("connection rejected by server: {0}")]
    ConnectRejected(String),

    /// The server acknowledged a request with `success: false`.
    #[error("{message}")]
    Rejected {
        /// Human-readable reason sent by the server.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Shadow Signal client operations.
pub type Result<T> = std::result::Result<T, ShadowSignalError>;
