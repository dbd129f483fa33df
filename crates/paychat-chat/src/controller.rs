//! Conversation controller: owns the message list and turns user intents
//! into streaming exchanges.

use futures_util::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paychat_llm_api::{ChatError, SendIntent, StreamSession};
use paychat_types::{placeholder_id, Conversation, Cost, Message, OptimizationNotice, Role, StreamEvent, Usage};

use crate::error::{ConversationError, Result};
use crate::events::{ControllerEvent, EventHub};
use crate::state::{ControllerState, Transition};
use crate::store::{ConversationPage, ConversationStore};

/// Token and cost totals accumulated over the controller's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: Cost,
}

impl Totals {
    fn add_usage(&mut self, usage: &Usage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
    }

    fn add_cost(&mut self, cost: &Cost) {
        self.cost.usd += cost.usd;
        self.cost.local += cost.local;
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// What an edit did
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Content was identical
    Unchanged,
    /// An assistant or system message was rewritten in place
    Edited,
    /// A user message was rewritten and resent; carries the new reply
    Resent(Message),
}

/// Cancels the exchange in flight, if any. Cheap to clone and safe to use
/// from another task (a Ctrl-C handler, a UI button).
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Canceller {
    /// Returns false when nothing was in flight
    pub fn cancel(&self) -> bool {
        match self.current.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(token.clone());
        }
        token
    }

    fn disarm(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }
}

/// Bookkeeping for the exchange in flight
#[derive(Debug)]
struct Exchange {
    /// Message list before the intent touched it
    snapshot: Vec<Message>,
    unsent: String,
    /// Position of the message being sent
    user_index: usize,
    reply_id: String,
    live: String,
}

pub struct ConversationController {
    session: StreamSession,
    store: Option<Arc<dyn ConversationStore>>,
    model: String,
    max_output_tokens: Option<u32>,
    messages: Vec<Message>,
    conversation: Option<Conversation>,
    state: ControllerState,
    exchange: Option<Exchange>,
    totals: Totals,
    last_optimization: Option<OptimizationNotice>,
    hub: EventHub,
    canceller: Canceller,
}

impl ConversationController {
    pub fn new(session: StreamSession, model: impl Into<String>) -> Self {
        Self {
            session,
            store: None,
            model: model.into(),
            max_output_tokens: None,
            messages: Vec::new(),
            conversation: None,
            state: ControllerState::Idle,
            exchange: None,
            totals: Totals::default(),
            last_optimization: None,
            hub: EventHub::default(),
            canceller: Canceller::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fixed completion limit; when unset the model catalog decides
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn last_optimization(&self) -> Option<&OptimizationNotice> {
        self.last_optimization.as_ref()
    }

    /// Text of the reply being streamed
    pub fn live_content(&self) -> Option<&str> {
        self.exchange.as_ref().map(|e| e.live.as_str())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ControllerEvent> {
        let rx = self.hub.subscribe();
        log::debug!("Controller has {} event subscribers", self.hub.subscriber_count());
        rx
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Append a user message and stream the reply.
    pub async fn send(&mut self, content: impl Into<String>) -> Result<Message> {
        self.ensure_idle()?;

        let snapshot = self.messages.clone();
        let message = Message::user(content);
        let history = self.messages.clone();
        self.messages.push(message.clone());

        self.run_exchange(message, history, snapshot).await
    }

    /// Rewrite the message at `index`.
    ///
    /// Editing a user message drops everything after it and resends it
    /// with the messages before it as history. Other roles are only
    /// rewritten.
    pub async fn edit(&mut self, index: usize, content: impl Into<String>) -> Result<EditOutcome> {
        self.ensure_idle()?;
        self.check_index(index)?;

        let content = content.into();
        if self.messages[index].content == content {
            return Ok(EditOutcome::Unchanged);
        }

        let snapshot = self.messages.clone();
        let message = &mut self.messages[index];
        message.content = content;
        message.updated = true;

        if message.role != Role::User {
            self.publish_messages();
            return Ok(EditOutcome::Edited);
        }

        self.messages.truncate(index + 1);
        let history = self.messages[..index].to_vec();
        let resent = self.messages[index].clone();

        self.run_exchange(resent, history, snapshot)
            .await
            .map(EditOutcome::Resent)
    }

    /// Resend the nearest user message at or before `index`, discarding
    /// every reply after it.
    pub async fn regenerate(&mut self, index: usize) -> Result<Message> {
        self.ensure_idle()?;
        self.check_index(index)?;

        let user_index = self.messages[..=index]
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or(ConversationError::NoUserMessage(index))?;

        let snapshot = self.messages.clone();
        self.messages.truncate(user_index + 1);
        self.messages[user_index].updated = true;

        let history = self.messages[..user_index].to_vec();
        let resent = self.messages[user_index].clone();

        self.run_exchange(resent, history, snapshot).await
    }

    /// Start a new chat
    pub fn clear(&mut self) {
        if self.exchange.take().is_some() {
            self.canceller.disarm();
        }
        self.transition(Transition::Reset);
        self.messages.clear();
        self.conversation = None;
        self.last_optimization = None;
        self.publish_messages();
        self.hub.publish(ControllerEvent::ConversationChanged(None));
    }

    /// Give up on an exchange whose future was dropped before it finished,
    /// restoring the message list it started from.
    pub fn abort(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            log::debug!("Aborting unfinished exchange");
            self.messages = exchange.snapshot;
            self.publish_messages();
        }
        self.canceller.disarm();
        self.transition(Transition::Reset);
    }

    /// Replace the list with a stored conversation's history.
    pub async fn load_conversation(&mut self, conversation: Conversation) -> Result<()> {
        self.ensure_idle()?;
        let store = self.store()?;

        let messages = store
            .load_messages(&conversation.id)
            .await
            .map_err(ConversationError::Store)?;

        log::info!("Loaded {} messages from conversation {}", messages.len(), conversation.id);
        self.messages = messages;
        self.conversation = Some(conversation);
        self.last_optimization = None;
        self.publish_messages();
        self.hub
            .publish(ControllerEvent::ConversationChanged(self.conversation.clone()));
        Ok(())
    }

    pub async fn list_conversations(&self, page: u32, limit: u32) -> Result<ConversationPage> {
        self.store()?
            .list_conversations(page, limit)
            .await
            .map_err(ConversationError::Store)
    }

    /// Delete a stored conversation; clears the chat when it is the open one
    pub async fn delete_conversation(&mut self, conversation_id: &str) -> Result<()> {
        self.ensure_idle()?;
        self.store()?
            .delete_conversation(conversation_id)
            .await
            .map_err(ConversationError::Store)?;

        if self.conversation.as_ref().is_some_and(|c| c.id == conversation_id) {
            self.clear();
        }
        Ok(())
    }

    fn store(&self) -> Result<Arc<dyn ConversationStore>> {
        self.store.clone().ok_or(ConversationError::NoStore)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != ControllerState::Idle || self.exchange.is_some() {
            return Err(ConversationError::Busy);
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.messages.len() {
            return Err(ConversationError::IndexOutOfRange {
                index,
                len: self.messages.len(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, transition: Transition) {
        match self.state.next(transition) {
            Some(next) if next != self.state => {
                self.state = next;
                self.hub.publish(ControllerEvent::StateChanged(next));
            }
            Some(_) => {}
            None => log::warn!("Ignoring {:?} while {}", transition, self.state),
        }
    }

    fn publish_messages(&mut self) {
        self.hub
            .publish(ControllerEvent::MessagesReplaced(self.messages.clone()));
    }

    /// `new_message` must already be the last element of the list.
    async fn run_exchange(
        &mut self,
        new_message: Message,
        history: Vec<Message>,
        snapshot: Vec<Message>,
    ) -> Result<Message> {
        self.exchange = Some(Exchange {
            snapshot,
            unsent: new_message.content.clone(),
            user_index: self.messages.len().saturating_sub(1),
            reply_id: placeholder_id(),
            live: String::new(),
        });
        self.transition(Transition::Send);
        self.publish_messages();

        let intent = SendIntent::new(self.model.clone(), new_message)
            .with_history(history)
            .with_conversation(self.conversation.as_ref().map(|c| c.id.clone()))
            .with_max_output_tokens(self.max_output_tokens);

        let token = self.canceller.arm();
        let mut stream = self.session.begin(intent);

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => Some(Err(ChatError::Cancelled)),
                item = stream.next() => item,
            };
            match next {
                Some(Ok(event)) => {
                    if let Some(reply) = self.apply_event(event) {
                        break Ok(reply);
                    }
                }
                Some(Err(err)) => break Err(err),
                None => break Err(ChatError::Transport("response ended without a stream end".to_string())),
            }
        };

        drop(stream);
        self.canceller.disarm();

        outcome.map_err(|err| self.fail(err))
    }

    /// Fold one session event into the controller. Returns the committed
    /// reply on `StreamEnd`.
    fn apply_event(&mut self, event: StreamEvent) -> Option<Message> {
        let Some(exchange) = self.exchange.as_mut() else {
            log::warn!("Dropping stream event with no exchange in flight: {:?}", event);
            return None;
        };

        match event {
            StreamEvent::ContentDelta(text) => {
                exchange.live.push_str(&text);
                self.transition(Transition::Delta);
                self.hub.publish(ControllerEvent::Delta(text));
            }
            StreamEvent::NewIds(ids) => {
                if let Some(reply_id) = &ids.assistant_message_id {
                    exchange.reply_id = reply_id.clone();
                }
                if let Some(sent) = self.messages.get_mut(exchange.user_index) {
                    sent.id = ids.user_message_id.clone();
                }
                self.hub.publish(ControllerEvent::IdsAssigned(ids));
            }
            StreamEvent::ConversationMeta(conversation) => {
                self.conversation = Some(conversation.clone());
                self.hub
                    .publish(ControllerEvent::ConversationChanged(Some(conversation)));
            }
            StreamEvent::Usage(usage) => {
                self.totals.add_usage(&usage);
                self.hub.publish(ControllerEvent::Usage(usage));
            }
            StreamEvent::Cost(cost) => {
                self.totals.add_cost(&cost);
                self.hub.publish(ControllerEvent::Cost(cost));
            }
            StreamEvent::OptimizationNotice(notice) => {
                self.last_optimization = Some(notice);
                self.hub.publish(ControllerEvent::Optimized(notice));
            }
            // the live buffer already holds the same text
            StreamEvent::AssistantReply(_) => {}
            StreamEvent::StreamEnd => {
                let exchange = self.exchange.take()?;
                let reply = Message::new(exchange.reply_id, Role::Assistant, exchange.live);
                self.messages.push(reply.clone());
                self.transition(Transition::Commit);
                self.hub.publish(ControllerEvent::Committed(reply.clone()));
                return Some(reply);
            }
        }
        None
    }

    fn fail(&mut self, error: ChatError) -> ConversationError {
        let unsent = match self.exchange.take() {
            Some(exchange) => {
                self.messages = exchange.snapshot;
                exchange.unsent
            }
            None => String::new(),
        };

        if error == ChatError::Cancelled {
            log::info!("Exchange cancelled");
        } else {
            log::warn!("Exchange failed: {}", error);
        }

        self.transition(Transition::Fail);
        self.publish_messages();
        self.hub.publish(ControllerEvent::Failed {
            error: error.clone(),
            unsent: unsent.clone(),
        });
        self.transition(Transition::Acknowledge);

        ConversationError::Exchange { source: error, unsent }
    }
}
