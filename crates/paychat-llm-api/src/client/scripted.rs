//! Transport that replays canned response chunks.
//!
//! Lets the session and controller run end to end without a network.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ByteStream, ChatTransport, TransportRequest};
use crate::error::{ChatError, Result};

/// Scripted outcome of one `open` call
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Stream these chunks (an `Err` chunk cuts the stream short)
    Chunks(Vec<std::result::Result<Vec<u8>, ChatError>>),
    /// Fail before any byte is delivered
    Reject(ChatError),
}

impl ScriptedResponse {
    /// Chunks given as text
    pub fn text<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedResponse::Chunks(chunks.into_iter().map(|c| Ok(c.into().into_bytes())).collect())
    }
}

/// Replays one [`ScriptedResponse`] per request and records what was sent
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: ScriptedResponse) -> Self {
        self.push(response);
        self
    }

    pub fn push(&self, response: ScriptedResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// Requests opened so far, oldest first
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(&self, request: TransportRequest) -> Result<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| ChatError::Transport("no scripted response left".to_string()))?;

        match next {
            ScriptedResponse::Reject(err) => Err(err),
            ScriptedResponse::Chunks(chunks) => {
                let items: Vec<Result<Bytes>> =
                    chunks.into_iter().map(|c| c.map(Bytes::from)).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
        }
    }
}
