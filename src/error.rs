//! Error types for the party-owner plugin.

use thiserror::Error;

/// Errors that can occur while talking to the League client or running a session.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The LCU answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code returned by the client.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The LCU refused the connection (usually: not started yet).
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other failure while issuing a request.
    #[error("request error: {0}")]
    Request(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Failed to send a frame through the event transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the event transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The event transport was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection parameters could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the LCU could not be reached at all.
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_))
    }
}

/// A specialized [`Result`] type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_only_for_http_errors() {
        let http = PluginError::Http {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(http.status(), Some(503));
        assert_eq!(PluginError::Timeout.status(), None);
        assert_eq!(
            PluginError::ConnectionRefused("refused".into()).status(),
            None
        );
    }

    #[test]
    fn display_includes_status() {
        let err = PluginError::Http {
            status: 404,
            message: "RPC_ERROR".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: RPC_ERROR");
    }

    #[test]
    fn refused_is_detected() {
        assert!(PluginError::ConnectionRefused("x".into()).is_connection_refused());
        assert!(!PluginError::Request("x".into()).is_connection_refused());
    }
}
