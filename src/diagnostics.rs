//! Connection-error reporting.
//!
//! The manager reports at most one [`ConnectionDiagnostic`] per suppression
//! window to a [`DiagnosticSink`]. The default [`TracingSink`] logs it; tests
//! and embedding applications can install their own sink to show a prompt or
//! count reports.

use std::time::Duration;

use tracing::{error, warn};

use crate::config::Environment;
use crate::error::ShadowSignalError;

/// Coarse classification of a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt hit the connect timeout.
    Timeout,
    /// The endpoint refused or could not be reached.
    Refused,
    /// Anything else (handshake rejected, protocol error, ...).
    Other,
}

impl FailureKind {
    /// Classify a connection error.
    pub fn classify(error: &ShadowSignalError) -> Self {
        match error {
            ShadowSignalError::Timeout => FailureKind::Timeout,
            ShadowSignalError::Io(io) => match io.kind() {
                std::io::ErrorKind::TimedOut => FailureKind::Timeout,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::AddrNotAvailable => FailureKind::Refused,
                _ => Self::classify_message(&io.to_string()),
            },
            other => Self::classify_message(&other.to_string()),
        }
    }

    fn classify_message(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("timeout") || message.contains("timed out") {
            FailureKind::Timeout
        } else if message.contains("refused") || message.contains("failed") {
            FailureKind::Refused
        } else {
            FailureKind::Other
        }
    }
}

/// One reported connection failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDiagnostic {
    /// Endpoint the attempt targeted.
    pub url: String,
    /// Display form of the underlying error.
    pub message: String,
    pub kind: FailureKind,
    pub environment: Environment,
    /// How long further errors stay quiet.
    pub suppression_window: Duration,
}

impl ConnectionDiagnostic {
    /// Human-readable lines for this diagnostic, by environment.
    ///
    /// Development yields one short hint. Production yields the error itself
    /// followed by the hints matching its [`FailureKind`].
    pub fn lines(&self) -> Vec<String> {
        match self.environment {
            Environment::Development => vec![format!(
                "game server not available at {}. Real-time game features will not work \
                 until it is running. (Errors will be suppressed for {} seconds)",
                self.url,
                self.suppression_window.as_secs()
            )],
            Environment::Production => {
                let mut lines = vec![format!("connection error: {}", self.message)];
                match self.kind {
                    FailureKind::Timeout => lines.push(format!(
                        "connection timeout - make sure the server is running on {}",
                        self.url
                    )),
                    FailureKind::Refused => {
                        lines.push(format!("cannot connect to server at {}", self.url));
                        lines.push(format!(
                            "if the server is on a different address, set {}",
                            crate::config::URL_ENV_VAR
                        ));
                    }
                    FailureKind::Other => lines.push(format!(
                        "make sure the server is running on {}",
                        self.url
                    )),
                }
                lines
            }
        }
    }
}

/// Receives the once-per-window connection diagnostic.
pub trait DiagnosticSink: Send + Sync + 'static {
    fn report(&self, diagnostic: &ConnectionDiagnostic);
}

/// Default sink: `warn!` in development, `error!` in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &ConnectionDiagnostic) {
        match diagnostic.environment {
            Environment::Development => {
                for line in diagnostic.lines() {
                    warn!(url = %diagnostic.url, "{line}");
                }
            }
            Environment::Production => {
                for line in diagnostic.lines() {
                    error!(url = %diagnostic.url, kind = ?diagnostic.kind, "{line}");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn diagnostic(environment: Environment, kind: FailureKind) -> ConnectionDiagnostic {
        ConnectionDiagnostic {
            url: "ws://localhost:4001".into(),
            message: "boom".into(),
            kind,
            environment,
            suppression_window: Duration::from_secs(60),
        }
    }

    #[test]
    fn classifies_common_failures() {
        assert_eq!(
            FailureKind::classify(&ShadowSignalError::Timeout),
            FailureKind::Timeout
        );
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(
            FailureKind::classify(&ShadowSignalError::Io(refused)),
            FailureKind::Refused
        );
        let wrapped = std::io::Error::other("IO error: Connection refused (os error 111)");
        assert_eq!(
            FailureKind::classify(&ShadowSignalError::Io(wrapped)),
            FailureKind::Refused
        );
        assert_eq!(
            FailureKind::classify(&ShadowSignalError::ConnectRejected("Not authorized".into())),
            FailureKind::Other
        );
    }

    #[test]
    fn development_diagnostic_is_a_single_hint() {
        let lines = diagnostic(Environment::Development, FailureKind::Refused).lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("60 seconds"));
        assert!(!lines[0].contains("boom"));
    }

    #[test]
    fn production_diagnostic_carries_detail() {
        let lines = diagnostic(Environment::Production, FailureKind::Refused).lines();
        assert_eq!(lines[0], "connection error: boom");
        assert!(lines.iter().any(|l| l.contains("SHADOW_SIGNAL_URL")));

        let lines = diagnostic(Environment::Production, FailureKind::Timeout).lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("timeout"));
    }
}
