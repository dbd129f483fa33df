//! Error types for the streaming client.

use thiserror::Error;

/// Result type for streaming client operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Everything that can go wrong between building a request and the end of
/// its response stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    /// One frame of the response could not be parsed. Recovered locally by
    /// the decoder and never surfaced to callers.
    #[error("malformed stream frame: {0}")]
    MalformedFrame(String),

    /// The request without any history is already over the limit.
    #[error("request base payload ({size} bytes) exceeds the {limit} byte limit")]
    BaseRequestTooLarge { size: usize, limit: usize },

    /// Dropping history was not enough to get under the limit.
    #[error(
        "request size ({size} bytes) still exceeds the {limit} byte limit after optimization; \
         please start a new conversation"
    )]
    RequestStillTooLarge { size: usize, limit: usize },

    /// Network or HTTP-level failure, including a stream cut short.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Server rejected the request.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Account balance cannot cover the request; carries the server's text.
    #[error("{0}")]
    InsufficientBalance(String),

    #[error("failed to serialize request: {0}")]
    Serialization(String),

    #[error("session cancelled")]
    Cancelled,
}

impl ChatError {
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, ChatError::InsufficientBalance(_))
    }

    /// The request could never be sent as-is
    pub fn is_size_error(&self) -> bool {
        matches!(
            self,
            ChatError::BaseRequestTooLarge { .. } | ChatError::RequestStillTooLarge { .. }
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}
