//! Typed game operations on top of [`Channel`].
//!
//! These are thin wrappers: they name the event, serialize the payload and
//! forward to the generic channel operations, so they share the same
//! lazy-connect and buffering behavior.

use std::fmt;

use tracing::warn;

use crate::channel::{Channel, ListenerId};
use crate::error::Result;
use crate::protocol::{Ack, ClientEvent, GameMode, ServerEvent, SERVER_EVENT_NAMES};

/// A room code as the server expects it: trimmed and upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl Channel {
    /// Send a typed request and hand the server's ack to `on_ack`.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::emit_with_ack`].
    pub fn request<F>(&self, event: ClientEvent, on_ack: F) -> Result<()>
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        let args = event.args()?;
        self.emit_with_ack(event.name(), args, on_ack)
    }

    /// Ask the server for a new room. The host is expected to join it
    /// afterwards with [`join_room`](Self::join_room).
    ///
    /// # Errors
    ///
    /// Same as [`Channel::emit_with_ack`].
    pub fn create_room<F>(&self, on_ack: F) -> Result<()>
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        self.request(ClientEvent::CreateRoom, on_ack)
    }

    /// Join `code` under the display name `name` (trimmed).
    ///
    /// # Errors
    ///
    /// Same as [`Channel::emit_with_ack`].
    pub fn join_room<F>(&self, code: &RoomCode, name: &str, on_ack: F) -> Result<()>
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        self.request(
            ClientEvent::JoinRoom {
                code: code.to_string(),
                name: name.trim().to_string(),
            },
            on_ack,
        )
    }

    /// Start the game in `code`. The server answers with a `game-started`
    /// push rather than an ack.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::emit`].
    pub fn start_game(&self, code: &RoomCode, mode: GameMode) -> Result<()> {
        let event = ClientEvent::StartGame {
            code: code.to_string(),
            mode,
        };
        self.emit(event.name(), event.args()?)
    }

    /// Vote to eliminate `voted_for_id`.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::emit_with_ack`].
    pub fn submit_vote<F>(&self, code: &RoomCode, voted_for_id: &str, on_ack: F) -> Result<()>
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        self.request(
            ClientEvent::SubmitVote {
                code: code.to_string(),
                voted_for_id: voted_for_id.to_string(),
            },
            on_ack,
        )
    }

    /// Subscribe `handler` to every game push, decoded into [`ServerEvent`].
    ///
    /// Pushes that fail to decode are logged and skipped. Returns one
    /// listener id per event name, in [`SERVER_EVENT_NAMES`] order.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after shutdown.
    pub fn on_server_event<F>(&self, handler: F) -> Result<Vec<(&'static str, ListenerId)>>
    where
        F: Fn(ServerEvent) + Send + Sync + 'static,
    {
        let handler = std::sync::Arc::new(handler);
        SERVER_EVENT_NAMES
            .iter()
            .map(|&name| {
                let handler = std::sync::Arc::clone(&handler);
                let id = self.on(name, move |args| match ServerEvent::decode(name, args) {
                    Some(Ok(event)) => handler(event),
                    Some(Err(e)) => warn!(event = %name, "failed to decode server push: {e}"),
                    None => {}
                })?;
                Ok((name, id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_is_normalized() {
        let code = RoomCode::new("  ab3k9 ");
        assert_eq!(code.as_str(), "AB3K9");
        assert_eq!(code.to_string(), "AB3K9");
        assert!(RoomCode::from("   ").is_empty());
    }
}
