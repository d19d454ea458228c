//! Connection state and error-suppression policy.
//!
//! [`ConnectionPolicy`] holds every piece of mutable connection state and
//! decides when an attempt may start and whether an error is reported. It
//! performs no I/O and never reads the clock itself; callers pass `now` in,
//! so the manager and the tests drive it with the same [`Instant`]s.

use std::time::Duration;

use tokio::time::Instant;

/// Publicly observable phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No attempt has been made yet.
    #[default]
    Idle,
    /// An attempt is in flight.
    Connecting,
    /// The server acknowledged the namespace connection.
    Connected,
    /// Waiting out a backoff delay before reconnect attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// Not connected and no attempt scheduled.
    Disconnected,
    /// The manager was shut down.
    Closed,
}

/// What to do with a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Surface a diagnostic; automatic reconnection has been disarmed.
    Report,
    /// Swallow silently; the error was counted.
    Suppress,
}

/// Mutable connection state, guarded by the manager's mutex.
#[derive(Debug)]
pub struct ConnectionPolicy {
    window: Duration,
    status: ConnectionStatus,
    connected: bool,
    last_reported_at: Option<Instant>,
    server_known_unavailable: bool,
    reconnection_enabled: bool,
    reported_errors: u64,
    suppressed_errors: u64,
}

impl ConnectionPolicy {
    /// Create a policy with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            status: ConnectionStatus::Idle,
            connected: false,
            last_reported_at: None,
            server_known_unavailable: false,
            reconnection_enabled: true,
            reported_errors: 0,
            suppressed_errors: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_server_known_unavailable(&self) -> bool {
        self.server_known_unavailable
    }

    pub fn is_reconnection_enabled(&self) -> bool {
        self.reconnection_enabled
    }

    pub fn last_reported_at(&self) -> Option<Instant> {
        self.last_reported_at
    }

    /// `(reported, suppressed)` error counts.
    pub fn error_counts(&self) -> (u64, u64) {
        (self.reported_errors, self.suppressed_errors)
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        match self.last_reported_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.window,
        }
    }

    /// Whether a caller-triggered operation may start an attempt now.
    ///
    /// Never true while connected or while an attempt or reconnect is
    /// already pending, so bursts of calls share one attempt.
    pub fn should_attempt(&self, now: Instant) -> bool {
        match self.status {
            ConnectionStatus::Connected
            | ConnectionStatus::Connecting
            | ConnectionStatus::Reconnecting { .. }
            | ConnectionStatus::Closed => false,
            ConnectionStatus::Idle | ConnectionStatus::Disconnected => {
                !self.server_known_unavailable || self.window_elapsed(now)
            }
        }
    }

    /// Record the start of a caller-triggered attempt, re-arming reconnection.
    pub fn begin_attempt(&mut self) {
        self.reconnection_enabled = true;
        self.status = ConnectionStatus::Connecting;
    }

    /// Record an established connection. Returns `false`, leaving the
    /// policy untouched, once it has been closed.
    pub fn on_connect(&mut self) -> bool {
        if self.status == ConnectionStatus::Closed {
            return false;
        }
        self.connected = true;
        self.status = ConnectionStatus::Connected;
        self.server_known_unavailable = false;
        self.last_reported_at = None;
        self.reconnection_enabled = true;
        true
    }

    /// Record a disconnect. Retry policy is left untouched.
    ///
    /// Returns whether the connection had been established.
    pub fn on_disconnect(&mut self) -> bool {
        let was_connected = self.connected;
        self.connected = false;
        if self.status != ConnectionStatus::Closed {
            self.status = ConnectionStatus::Disconnected;
        }
        was_connected
    }

    pub fn on_connect_error(&mut self, now: Instant) -> ErrorDisposition {
        self.connected = false;
        if self.status != ConnectionStatus::Closed {
            self.status = ConnectionStatus::Disconnected;
        }
        if self.window_elapsed(now) {
            self.server_known_unavailable = true;
            self.reconnection_enabled = false;
            self.last_reported_at = Some(now);
            self.reported_errors += 1;
            ErrorDisposition::Report
        } else {
            self.suppressed_errors += 1;
            ErrorDisposition::Suppress
        }
    }

    /// Decide whether a scheduled reconnect attempt may proceed.
    ///
    /// Cancels it (returns `false`) when the server is already known to be
    /// down or reconnection has been disarmed in the meantime.
    pub fn on_reconnect_attempt(&mut self) -> bool {
        if self.server_known_unavailable || !self.reconnection_enabled {
            self.status = ConnectionStatus::Disconnected;
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        true
    }

    pub fn close(&mut self) {
        self.connected = false;
        self.reconnection_enabled = false;
        self.status = ConnectionStatus::Closed;
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

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn first_error_is_reported_and_disarms_reconnection() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        let now = Instant::now();
        policy.begin_attempt();

        assert_eq!(policy.on_connect_error(now), ErrorDisposition::Report);
        assert!(policy.is_server_known_unavailable());
        assert!(!policy.is_reconnection_enabled());
        assert_eq!(policy.last_reported_at(), Some(now));
        assert_eq!(policy.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn errors_inside_window_are_counted_not_reported() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        let start = Instant::now();

        let dispositions: Vec<_> = (0..10)
            .map(|i| policy.on_connect_error(start + Duration::from_secs(i * 5)))
            .collect();

        let reported = dispositions
            .iter()
            .filter(|d| **d == ErrorDisposition::Report)
            .count();
        assert_eq!(reported, 1);
        assert_eq!(policy.error_counts(), (1, 9));
        assert_eq!(policy.last_reported_at(), Some(start));
    }

    #[test]
    fn error_after_window_is_reported_again() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        let start = Instant::now();
        policy.on_connect_error(start);

        assert_eq!(
            policy.on_connect_error(start + Duration::from_secs(60)),
            ErrorDisposition::Suppress
        );
        assert_eq!(
            policy.on_connect_error(start + Duration::from_secs(61)),
            ErrorDisposition::Report
        );
    }

    #[test]
    fn attempt_gating_follows_window() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        let start = Instant::now();
        assert!(policy.should_attempt(start));

        policy.begin_attempt();
        assert!(!policy.should_attempt(start), "attempt already in flight");

        policy.on_connect_error(start);
        assert!(!policy.should_attempt(start + Duration::from_secs(30)));
        assert!(policy.should_attempt(start + Duration::from_secs(61)));

        policy.begin_attempt();
        assert!(policy.is_reconnection_enabled());
    }

    #[test]
    fn connect_resets_unavailability() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        let start = Instant::now();
        policy.on_connect_error(start);
        policy.begin_attempt();

        policy.on_connect();

        assert!(policy.is_connected());
        assert!(!policy.is_server_known_unavailable());
        assert!(policy.is_reconnection_enabled());
        assert_eq!(policy.last_reported_at(), None);
        assert!(!policy.should_attempt(start));
    }

    #[test]
    fn disconnect_keeps_retry_policy() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        policy.begin_attempt();
        policy.on_connect();

        assert!(policy.on_disconnect());
        assert!(policy.is_reconnection_enabled());
        assert!(!policy.is_server_known_unavailable());
        assert!(!policy.on_disconnect(), "second disconnect was not connected");
    }

    #[test]
    fn reconnect_attempt_cancelled_when_server_known_down() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        policy.begin_attempt();
        policy.on_connect();
        policy.on_disconnect();
        policy.set_status(ConnectionStatus::Reconnecting { attempt: 1 });
        assert!(policy.on_reconnect_attempt());
        assert_eq!(policy.status(), ConnectionStatus::Connecting);

        policy.on_connect_error(Instant::now());
        policy.set_status(ConnectionStatus::Reconnecting { attempt: 2 });
        assert!(!policy.on_reconnect_attempt());
        assert_eq!(policy.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn closed_policy_never_attempts() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        policy.close();
        assert!(!policy.should_attempt(Instant::now()));
        policy.on_connect_error(Instant::now());
        assert_eq!(policy.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn late_handshake_does_not_reopen_closed_policy() {
        let mut policy = ConnectionPolicy::new(WINDOW);
        policy.begin_attempt();
        policy.close();

        assert!(!policy.on_connect());
        assert_eq!(policy.status(), ConnectionStatus::Closed);
        assert!(!policy.is_connected());
        policy.on_disconnect();
        assert_eq!(policy.status(), ConnectionStatus::Closed);
    }
}
