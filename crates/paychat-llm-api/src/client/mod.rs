use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;

use crate::error::{ChatError, Result};

pub mod http;
pub mod scripted;

pub use http::HttpTransport;
pub use scripted::{ScriptedResponse, ScriptedTransport};

/// Response body as pulled from the network, one chunk at a time
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One outgoing chat request, already serialized and size-checked
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub model: String,
    pub body: String,
    pub bearer: Option<String>,
}

/// Opens the response stream for a chat request
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: TransportRequest) -> Result<ByteStream>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success HTTP response body onto a [`ChatError`].
///
/// Status 402 or a message mentioning an insufficient balance becomes
/// [`ChatError::InsufficientBalance`] so front ends can offer a top-up.
pub fn error_from_response(status: u16, body: &str, fallback: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    if status == 402 || message.to_lowercase().contains("insufficient balance") {
        ChatError::InsufficientBalance(message)
    } else {
        ChatError::Api { status, message }
    }
}
