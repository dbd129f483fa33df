//! One request/response cycle of the streaming chat endpoint.

use async_stream::try_stream;
use futures_util::StreamExt;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use paychat_types::{
    Message, NewIds, OptimizationNotice, OutgoingRequest, Role, StreamEvent,
    DEFAULT_MAX_OUTPUT_TOKENS,
};

use crate::auth::CredentialProvider;
use crate::budget::HistoryBudgeter;
use crate::catalog::ModelCatalog;
use crate::client::{ChatTransport, TransportRequest};
use crate::decoder::FrameDecoder;
use crate::error::{ChatError, Result};

/// Event source returned by [`StreamSession::begin`].
///
/// Successful sessions end with `Ok(StreamEvent::StreamEnd)`; failed ones
/// end with a single `Err`. Dropping the stream cancels the session.
pub type SessionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// What the caller wants sent
#[derive(Debug, Clone, PartialEq)]
pub struct SendIntent {
    pub model: String,
    pub new_message: Message,
    pub conversation_id: Option<String>,
    /// Full prior history; trimmed to fit when the request is too large
    pub history: Vec<Message>,
    /// Looked up in the model catalog when absent
    pub max_output_tokens: Option<u32>,
}

impl SendIntent {
    pub fn new(model: impl Into<String>, new_message: Message) -> Self {
        Self {
            model: model.into(),
            new_message,
            conversation_id: None,
            history: Vec::new(),
            max_output_tokens: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// A request that passed the size checks and is ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub request: OutgoingRequest,
    pub body: String,
    /// Set when history had to be dropped to fit
    pub notice: Option<OptimizationNotice>,
}

/// Builds requests, opens the transport and decodes the response.
#[derive(Clone)]
pub struct StreamSession {
    transport: Arc<dyn ChatTransport>,
    catalog: Arc<dyn ModelCatalog>,
    credentials: Arc<dyn CredentialProvider>,
    budgeter: HistoryBudgeter,
}

impl StreamSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<dyn ModelCatalog>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            catalog,
            credentials,
            budgeter: HistoryBudgeter::default(),
        }
    }

    /// Override the size limits (mainly for tests)
    pub fn with_budgeter(mut self, budgeter: HistoryBudgeter) -> Self {
        self.budgeter = budgeter;
        self
    }

    pub fn ceiling(&self) -> usize {
        self.budgeter.total_budget()
    }

    async fn resolve_max_output_tokens(&self, intent: &SendIntent) -> u32 {
        if let Some(explicit) = intent.max_output_tokens {
            return explicit;
        }
        match self.catalog.max_completion_tokens(&intent.model).await {
            Ok(Some(limit)) => limit,
            Ok(None) => DEFAULT_MAX_OUTPUT_TOKENS,
            Err(e) => {
                log::warn!("Failed to fetch model max tokens, using default: {}", e);
                DEFAULT_MAX_OUTPUT_TOKENS
            }
        }
    }

    /// Resolve limits, trim history if needed and serialize the request.
    pub async fn prepare(&self, intent: SendIntent) -> Result<PreparedRequest> {
        let max_output_tokens = self.resolve_max_output_tokens(&intent).await;
        let ceiling = self.ceiling();

        let mut request = OutgoingRequest {
            model: intent.model,
            new_message: intent.new_message,
            max_output_tokens,
            conversation_id: intent.conversation_id,
            history: intent.history,
        };

        let mut body = request.to_json()?;
        let mut notice = None;

        if body.len() > ceiling {
            log::warn!(
                "Request size ({:.2}MB) exceeds {}MB limit. Optimizing chat history...",
                body.len() as f64 / 1024.0 / 1024.0,
                ceiling / 1024 / 1024
            );

            let history = std::mem::take(&mut request.history);
            let fixed_payload_size = request.serialized_size()?;
            let outcome = self.budgeter.fit(&history, fixed_payload_size)?;

            request.history = outcome.history;
            notice = outcome.notice;
            body = request.to_json()?;

            log::info!("Optimized request size: {:.2}MB", body.len() as f64 / 1024.0 / 1024.0);
        }

        if body.len() > ceiling {
            return Err(ChatError::RequestStillTooLarge { size: body.len(), limit: ceiling });
        }

        Ok(PreparedRequest { request, body, notice })
    }

    /// Start a session. Nothing is sent until the returned stream is polled.
    pub fn begin(&self, intent: SendIntent) -> SessionStream {
        Box::pin(run_session(self.clone(), intent))
    }

    /// Run a session to completion, collecting every event.
    ///
    /// Stops at the first error.
    pub async fn collect(&self, intent: SendIntent) -> Result<Vec<StreamEvent>> {
        let mut stream = self.begin(intent);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event?);
        }
        Ok(events)
    }
}

fn run_session(session: StreamSession, intent: SendIntent) -> impl Stream<Item = Result<StreamEvent>> + Send {
    try_stream! {
        let prepared = session.prepare(intent).await?;
        if let Some(notice) = prepared.notice {
            yield StreamEvent::OptimizationNotice(notice);
        }

        let mut bytes = session
            .transport
            .open(TransportRequest {
                model: prepared.request.model.clone(),
                body: prepared.body,
                bearer: session.credentials.bearer_token(),
            })
            .await?;

        let mut decoder = FrameDecoder::new();
        let mut accumulated_content = String::new();
        let mut new_ids: Option<NewIds> = None;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                match &event {
                    StreamEvent::ContentDelta(text) => accumulated_content.push_str(text),
                    StreamEvent::NewIds(ids) => new_ids = Some(ids.clone()),
                    _ => {}
                }
                yield event;
            }
        }

        log::debug!(
            "Response stream ended after {} frames ({} malformed)",
            decoder.frames_seen(),
            decoder.malformed_frames()
        );

        for event in decoder.finish() {
            if event.is_end() {
                let content = std::mem::take(&mut accumulated_content);
                let reply = match new_ids.take().and_then(|ids| ids.assistant_message_id) {
                    Some(id) => Message::new(id, Role::Assistant, content),
                    None => Message::assistant(content),
                };
                yield StreamEvent::AssistantReply(reply);
            }
            yield event;
        }
    }
}
