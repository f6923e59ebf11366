//! Protocol-level errors for stream frame processing
//!
//! Every variant carries enough context to log the offending frame without
//! holding on to it. None of these are fatal to a stream: callers drop the
//! frame and keep reading.

use thiserror::Error;

/// Frame decoding errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Text was not valid JSON
    #[error("Invalid JSON: {reason}")]
    InvalidJson { reason: String },

    /// Frame is JSON but matches no known shape
    #[error("Unexpected frame shape: {context}")]
    UnexpectedShape { context: String },

    /// Required payload field absent
    #[error("Missing field '{field}' in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    /// Numeric field could not be represented
    #[error("Invalid number in '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// `data` array was empty where one record was expected
    #[error("Empty payload for topic {topic}")]
    EmptyPayload { topic: String },
}

impl ProtocolError {
    pub fn unexpected(context: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            reason: err.to_string(),
        }
    }
}

/// Codec result type
pub type Result<T> = std::result::Result<T, ProtocolError>;
