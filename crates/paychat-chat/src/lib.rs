//! Conversation management for paychat
//!
//! This crate holds the authoritative message list, the controller state
//! machine that turns send/edit/regenerate/clear intents into streaming
//! exchanges, and access to conversations stored on the server.

pub mod controller;
pub mod error;
pub mod events;
pub mod state;
pub mod store;


// Re-export commonly used types
pub use controller::{Canceller, ConversationController, EditOutcome, Totals};
pub use error::{ConversationError, Result};
pub use events::{ControllerEvent, EventHub};
pub use state::{ControllerState, Transition};
pub use store::{exchanges_to_messages, ConversationPage, ConversationStore, HttpConversationStore};
