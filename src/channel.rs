//! The shared event channel handle.
//!
//! [`Channel`] is usable the moment it is handed out: every communication
//! operation first asks the manager to make sure a connection exists (or is
//! being established), then forwards the call. Nothing here waits for the
//! network. Packets emitted before the connection is up are buffered and
//! flushed in order once the server accepts the connection.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::codec::Packet;
use crate::error::Result;
use crate::manager::Shared;
use crate::protocol::Ack;

/// Callback invoked with the server's acknowledgment.
pub type AckCallback = Box<dyn FnOnce(Ack) + Send + 'static>;

/// Handler for an inbound event, called with its positional arguments.
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync + 'static>;

/// Event name used by [`Channel::send`].
pub const MESSAGE_EVENT: &str = "message";

/// Identifies one registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    once: bool,
    handler: EventHandler,
}

/// Event listeners keyed by event name.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    by_event: HashMap<String, Vec<Listener>>,
}

impl Listeners {
    fn add(&mut self, event: &str, once: bool, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_event
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, once, handler });
        id
    }

    fn remove(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(list) = self.by_event.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_event.remove(event);
        }
        removed
    }

    fn remove_all(&mut self, event: &str) -> usize {
        self.by_event.remove(event).map_or(0, |list| list.len())
    }

    /// Handlers to run for `event`; `once` listeners are removed.
    pub(crate) fn take_handlers(&mut self, event: &str) -> Vec<EventHandler> {
        let Some(list) = self.by_event.get_mut(event) else {
            return Vec::new();
        };
        let handlers = list.iter().map(|l| Arc::clone(&l.handler)).collect();
        list.retain(|l| !l.once);
        if list.is_empty() {
            self.by_event.remove(event);
        }
        handlers
    }

    pub(crate) fn clear(&mut self) {
        self.by_event.clear();
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.by_event.get(event).map_or(0, Vec::len)
    }
}

/// Handle to the single real-time connection owned by a
/// [`ConnectionManager`](crate::ConnectionManager).
///
/// Obtained from [`ConnectionManager::channel`](crate::ConnectionManager::channel).
/// Clones share the same connection.
///
/// Every operation returns `Ok` while the manager is alive, whether or not
/// the server is reachable; connection failures are handled (and reported)
/// by the manager. After [`shutdown`](crate::ConnectionManager::shutdown)
/// every operation fails with
/// [`ShadowSignalError::ChannelClosed`](crate::ShadowSignalError::ChannelClosed).
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

impl Channel {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Whether two handles refer to the same connection.
    pub fn ptr_eq(a: &Channel, b: &Channel) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Emit an event without expecting an acknowledgment.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after
    /// shutdown, [`Serialization`](crate::ShadowSignalError::Serialization)
    /// if the packet cannot be encoded.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.shared.check_open()?;
        self.shared.ensure_connected();
        self.shared.enqueue(
            Packet::Event {
                id: None,
                name: event.to_string(),
                args,
            },
            None,
        )
    }

    /// Emit an event and register a callback for the server's acknowledgment.
    ///
    /// The callback runs once, when the ack arrives. It is never invoked if
    /// no answer comes: a request still buffered waits for the next
    /// connection, a request already sent on a session that ends is dropped
    /// with that session, and everything left is dropped on shutdown.
    ///
    /// # Errors
    ///
    /// Same as [`emit`](Self::emit).
    pub fn emit_with_ack<F>(&self, event: &str, args: Vec<Value>, on_ack: F) -> Result<()>
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        self.shared.check_open()?;
        self.shared.ensure_connected();
        let id = self.shared.register_ack(Box::new(on_ack));
        self.shared.enqueue(
            Packet::Event {
                id: Some(id),
                name: event.to_string(),
                args,
            },
            Some(id),
        )
    }

    /// Emit an event and return a receiver resolving to the acknowledgment.
    ///
    /// The receiver errors if the ack is discarded (shutdown, a full
    /// outbound buffer, or the session ending before the answer).
    ///
    /// # Errors
    ///
    /// Same as [`emit`](Self::emit).
    pub fn emit_ack(&self, event: &str, args: Vec<Value>) -> Result<oneshot::Receiver<Ack>> {
        let (tx, rx) = oneshot::channel();
        self.emit_with_ack(event, args, move |ack| {
            let _ = tx.send(ack);
        })?;
        Ok(rx)
    }

    /// Emit a plain `message` event.
    ///
    /// # Errors
    ///
    /// Same as [`emit`](Self::emit).
    pub fn send(&self, args: Vec<Value>) -> Result<()> {
        self.emit(MESSAGE_EVENT, args)
    }

    /// Register a handler for every occurrence of `event`.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after shutdown.
    pub fn on<F>(&self, event: &str, handler: F) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.subscribe(event, false, Arc::new(handler))
    }

    /// Register a handler for the next occurrence of `event` only.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after shutdown.
    pub fn once<F>(&self, event: &str, handler: F) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.subscribe(event, true, Arc::new(handler))
    }

    fn subscribe(&self, event: &str, once: bool, handler: EventHandler) -> Result<ListenerId> {
        self.shared.check_open()?;
        self.shared.ensure_connected();
        Ok(self.shared.listeners().add(event, once, handler))
    }

    /// Remove one listener. Returns whether it was registered.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after shutdown.
    pub fn off(&self, event: &str, id: ListenerId) -> Result<bool> {
        self.shared.check_open()?;
        self.shared.ensure_connected();
        Ok(self.shared.listeners().remove(event, id))
    }

    /// Remove every listener for `event`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`ChannelClosed`](crate::ShadowSignalError::ChannelClosed) after shutdown.
    pub fn off_all(&self, event: &str) -> Result<usize> {
        self.shared.check_open()?;
        self.shared.ensure_connected();
        Ok(self.shared.listeners().remove_all(event))
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared.listeners().count(event)
    }

    /// Whether the connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Session id assigned by the server for the current connection.
    pub fn id(&self) -> Option<String> {
        self.shared.session_id()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("connected", &self.is_connected())
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> EventHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn once_listeners_are_removed_after_first_dispatch() {
        let mut listeners = Listeners::default();
        let hits = Arc::new(AtomicUsize::new(0));
        listeners.add("timer-tick", false, counting(&hits));
        listeners.add("timer-tick", true, counting(&hits));

        assert_eq!(listeners.take_handlers("timer-tick").len(), 2);
        assert_eq!(listeners.take_handlers("timer-tick").len(), 1);
        assert_eq!(listeners.count("timer-tick"), 1);
    }

    #[test]
    fn remove_targets_single_listener() {
        let mut listeners = Listeners::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = listeners.add("game-started", false, counting(&hits));
        let b = listeners.add("game-started", false, counting(&hits));

        assert!(listeners.remove("game-started", a));
        assert!(!listeners.remove("game-started", a));
        assert!(!listeners.remove("speaker-changed", b));
        assert_eq!(listeners.count("game-started"), 1);
        assert_eq!(listeners.remove_all("game-started"), 1);
        assert_eq!(listeners.count("game-started"), 0);
    }

    #[test]
    fn unknown_event_has_no_handlers() {
        let mut listeners = Listeners::default();
        assert!(listeners.take_handlers("nothing").is_empty());
    }
}
