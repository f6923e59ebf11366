//! Error types for the adapters module

use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport could not be opened
    #[error("Connection failed to {url}: {reason}")]
    ConnectionFailed {
        /// Endpoint that refused or failed
        url: String,
        /// Underlying reason
        reason: String,
    },

    /// Connection timeout during establish or state wait
    #[error("Connection timeout for {url} after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Endpoint that timed out
        url: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Operation requires an open stream
    #[error("Stream is not connected")]
    NotConnected,

    /// No pong observed within the heartbeat deadline
    #[error("Heartbeat timeout: no pong within {timeout_ms}ms")]
    HeartbeatTimeout {
        /// Pong deadline in milliseconds
        timeout_ms: u64,
    },

    /// Client was disposed and cannot be reused
    #[error("Stream client has been disposed")]
    Disposed,

    /// Frame decoding failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] codec::ProtocolError),

    /// JSON parsing error from a REST response
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// System errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Venue answered with a non-zero return code
    #[error("REST call {endpoint} rejected: code {code}, {message}")]
    Rest {
        /// Path that was called
        endpoint: String,
        /// Venue return code
        code: i64,
        /// Venue message
        message: String,
    },

    /// I/O error during journal operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error in adapter settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Not supported operation
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl AdapterError {
    /// Check if this error is recoverable through retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionFailed { .. }
                | AdapterError::ConnectionTimeout { .. }
                | AdapterError::NotConnected
                | AdapterError::HeartbeatTimeout { .. }
                | AdapterError::Protocol(_)
                | AdapterError::JsonParse(_)
                | AdapterError::WebSocket(_)
                | AdapterError::Http(_)
                | AdapterError::Io(_)
        )
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AdapterError::Disposed | AdapterError::Configuration(_) | AdapterError::NotSupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AdapterError::NotConnected.is_recoverable());
        assert!(AdapterError::HeartbeatTimeout { timeout_ms: 30_000 }.is_recoverable());
        assert!(!AdapterError::Disposed.is_recoverable());
        assert!(AdapterError::Disposed.is_permanent());
        assert!(AdapterError::Configuration("bad".into()).is_permanent());
    }
}
