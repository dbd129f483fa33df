//! Notifications published to front ends.

use tokio::sync::mpsc;

use paychat_llm_api::ChatError;
use paychat_types::{Conversation, Cost, Message, NewIds, OptimizationNotice, Usage};

use crate::state::ControllerState;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged(ControllerState),
    /// Message list was rewritten (send, truncation, load, clear, rollback)
    MessagesReplaced(Vec<Message>),
    /// Text appended to the in-progress reply
    Delta(String),
    /// Server ids assigned to the message pair of the current exchange
    IdsAssigned(NewIds),
    /// Assistant reply appended to the list
    Committed(Message),
    ConversationChanged(Option<Conversation>),
    Usage(Usage),
    Cost(Cost),
    Optimized(OptimizationNotice),
    /// Exchange failed; `unsent` can be resubmitted
    Failed { error: ChatError, unsent: String },
}

/// Fan-out of [`ControllerEvent`]s to any number of subscribers
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Vec<mpsc::UnboundedSender<ControllerEvent>>,
}

impl EventHub {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ControllerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber, forgetting the ones that hung up
    pub fn publish(&mut self, event: ControllerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
