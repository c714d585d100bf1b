//! Error types for the REST client and the push hub.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from REST calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Client construction or request building failed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status of an API error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the conversation or message no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Whether the token was rejected or lacks permission.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Errors from the push hub connection.
#[derive(Debug, Error)]
pub enum HubError {
    /// Failed to connect.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connecting took longer than the configured timeout.
    #[error("connection timed out")]
    Timeout,

    /// The server rejected or garbled the protocol handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A frame did not follow the hub protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to send a frame.
    #[error("send failed: {0}")]
    Send(String),
}
