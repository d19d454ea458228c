//! Client configuration.

use std::time::Duration;

use crate::backoff::ReconnectConfig;

/// Environment variable holding the server base URL.
pub const URL_ENV_VAR: &str = "SHADOW_SIGNAL_URL";

/// Environment variable selecting `development` or `production` diagnostics.
pub const ENVIRONMENT_ENV_VAR: &str = "SHADOW_SIGNAL_ENV";

/// Server base URL used when none is configured.
pub const DEFAULT_URL: &str = "http://localhost:4001";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_OUTBOUND_BUFFER_CAPACITY: usize = 256;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Deployment environment; controls how much detail connection diagnostics
/// carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// One short hint on how to start the server.
    #[default]
    Development,
    /// Full error detail.
    Production,
}

impl Environment {
    /// Parse an environment name. Anything other than `production` / `prod`
    /// is treated as development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// # Example
///
/// ```
/// use shadow_signal_client::config::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("http://game.example:4001")
///     .with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(
///     config.endpoint(),
///     "ws://game.example:4001/socket.io/?EIO=4&transport=websocket"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the game server (`http`, `https`, `ws` or `wss`).
    pub url: String,
    /// Deployment environment for diagnostics.
    pub environment: Environment,
    /// Whether this execution context may open network connections at all.
    /// When `false` the manager never attempts to connect.
    pub network_enabled: bool,
    /// Deadline for one connection attempt, handshake included.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Period during which repeated connection errors are not re-reported.
    ///
    /// Defaults to **60 seconds**.
    pub suppression_window: Duration,
    /// Automatic reconnection backoff.
    pub reconnect: ReconnectConfig,
    /// Capacity of the bounded lifecycle event channel. Values below 1 are
    /// clamped to 1.
    pub event_channel_capacity: usize,
    /// How many outbound packets may wait for a connection. When full, new
    /// packets are dropped with a warning. Values below 1 are clamped to 1.
    pub outbound_buffer_capacity: usize,
    /// Grace period for [`shutdown`](crate::ConnectionManager::shutdown).
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given server URL with default values.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            environment: Environment::default(),
            network_enabled: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            suppression_window: DEFAULT_SUPPRESSION_WINDOW,
            reconnect: ReconnectConfig::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            outbound_buffer_capacity: DEFAULT_OUTBOUND_BUFFER_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Build a configuration from `SHADOW_SIGNAL_URL` and `SHADOW_SIGNAL_ENV`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup(URL_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let environment = lookup(ENVIRONMENT_ENV_VAR)
            .map(|v| Environment::parse(&v))
            .unwrap_or_default();
        Self::new(url).with_environment(environment)
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_network_enabled(mut self, enabled: bool) -> Self {
        self.network_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_outbound_buffer_capacity(mut self, capacity: usize) -> Self {
        self.outbound_buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The WebSocket endpoint derived from [`url`](Self::url).
    ///
    /// `http` maps to `ws`, `https` to `wss`; a URL without a scheme is
    /// treated as `ws`. The Socket.IO path and query are appended unless the
    /// URL already carries a path.
    ///
    /// A URL with a path is taken as the complete Engine.IO endpoint
    /// (`ws://host/custom/?EIO=4&transport=websocket`). Unlike
    /// `socket.io-client`, the path does not select a namespace: the client
    /// always joins the default namespace `/`.
    pub fn endpoint(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        let (scheme, rest) = match url.split_once("://") {
            Some(("https" | "wss", rest)) => ("wss", rest),
            Some((_, rest)) => ("ws", rest),
            None => ("ws", url),
        };
        if rest.contains('/') {
            format!("{scheme}://{rest}")
        } else {
            format!("{scheme}://{rest}/socket.io/?EIO=4&transport=websocket")
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.network_enabled);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.suppression_window, Duration::from_secs(60));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.outbound_buffer_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn capacities_are_clamped() {
        let config = ClientConfig::default()
            .with_event_channel_capacity(0)
            .with_outbound_buffer_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.outbound_buffer_capacity, 1);
    }

    #[test]
    fn endpoint_maps_schemes() {
        assert_eq!(
            ClientConfig::default().endpoint(),
            "ws://localhost:4001/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            ClientConfig::new("https://play.example.com/").endpoint(),
            "wss://play.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            ClientConfig::new("localhost:4001").endpoint(),
            "ws://localhost:4001/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            ClientConfig::new("ws://10.0.0.2:4001/custom/?EIO=4&transport=websocket").endpoint(),
            "ws://10.0.0.2:4001/custom/?EIO=4&transport=websocket"
        );
        // A bare path is not a namespace; it replaces the Socket.IO path.
        assert_eq!(
            ClientConfig::new("http://play.example.com/lobby").endpoint(),
            "ws://play.example.com/lobby"
        );
    }

    #[test]
    fn from_lookup_reads_url_and_environment() {
        let vars: HashMap<&str, &str> = [
            (URL_ENV_VAR, "http://10.1.1.1:9000"),
            (ENVIRONMENT_ENV_VAR, "Production"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.url, "http://10.1.1.1:9000");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn from_lookup_falls_back_to_defaults() {
        let config = ClientConfig::from_lookup(|k| {
            (k == URL_ENV_VAR).then(|| "   ".to_string())
        });
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.environment, Environment::Development);
    }
}
