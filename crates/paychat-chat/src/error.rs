//! Errors surfaced by the conversation controller.

use paychat_llm_api::ChatError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversationError {
    /// An exchange is already in flight
    #[error("a response is still in progress")]
    Busy,

    #[error("no message at index {index} (conversation has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no user message at or before index {0}")]
    NoUserMessage(usize),

    /// The exchange failed and the message list was rolled back.
    /// `unsent` holds the content that did not get a reply.
    #[error("{source}")]
    Exchange {
        #[source]
        source: ChatError,
        unsent: String,
    },

    #[error("conversation store error: {0}")]
    Store(#[source] ChatError),

    #[error("no conversation store configured")]
    NoStore,
}

impl ConversationError {
    /// Underlying client error, when there is one
    pub fn chat_error(&self) -> Option<&ChatError> {
        match self {
            ConversationError::Exchange { source, .. } | ConversationError::Store(source) => Some(source),
            _ => None,
        }
    }

    /// Content the caller may want to put back into the input box
    pub fn unsent_content(&self) -> Option<&str> {
        match self {
            ConversationError::Exchange { unsent, .. } => Some(unsent),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.chat_error(), Some(ChatError::Cancelled))
    }
}
