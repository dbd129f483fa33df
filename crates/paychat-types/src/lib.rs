//! Core types and structures for paychat
//!
//! This crate provides the foundational types shared by the streaming
//! client, the conversation controller and the terminal front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Hard ceiling on the serialized size of an outgoing chat request (4 MiB)
pub const MAX_REQUEST_SIZE: usize = 4 * 1024 * 1024;

/// Reserve kept free when packing history into a request (100 KiB)
pub const HISTORY_SAFETY_MARGIN: usize = 100 * 1024;

/// Completion length used when the model catalog has no answer
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Rough bytes-per-token ratio used for savings estimates
pub const BYTES_PER_TOKEN_ESTIMATE: usize = 4;

/// Prefix given to ids that have not been confirmed by the server yet
pub const PLACEHOLDER_ID_PREFIX: &str = "temp-";

// ============================================================================
// Message Types
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Helper function to deserialize string or null values
pub fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

/// One entry of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "chatId")]
    pub id: String,
    pub role: Role,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub content: String,
    /// Content was rewritten in place by an edit or is being superseded
    #[serde(default)]
    pub updated: bool,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            updated: false,
        }
    }

    /// A message carrying a locally generated id
    pub fn placeholder(role: Role, content: impl Into<String>) -> Self {
        Self::new(placeholder_id(), role, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::placeholder(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::placeholder(Role::Assistant, content)
    }

    pub fn has_placeholder_id(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_ID_PREFIX)
    }

    /// Size of this message once serialized as a JSON array element
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// Generate a fresh placeholder id (`temp-<uuid>`)
pub fn placeholder_id() -> String {
    format!("{}{}", PLACEHOLDER_ID_PREFIX, uuid::Uuid::new_v4())
}

// ============================================================================
// Conversation Types
// ============================================================================

/// A server-side conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "conversationId")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "lastMessageAt", default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "conversationCreatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Stream Events
// ============================================================================

/// Token accounting reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(alias = "promptTokens", default)]
    pub prompt_tokens: u64,
    #[serde(alias = "completionTokens", default)]
    pub completion_tokens: u64,
    #[serde(alias = "totalTokens", default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.prompt_tokens + self.completion_tokens)
    }
}

/// Price charged for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    #[serde(alias = "USD", default)]
    pub usd: f64,
    /// Amount in the account's local currency (IDR on the wire)
    #[serde(rename = "idr", alias = "local", alias = "IDR", default)]
    pub local: f64,
}

/// Server-issued ids for the message pair of one exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIds {
    pub user_message_id: String,
    /// Missing when the server only confirmed the user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message_id: Option<String>,
}

/// History was shortened before reaching the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationNotice {
    pub original_count: usize,
    pub kept_count: usize,
    pub estimated_tokens_saved: u64,
    /// Only reported by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<u64>,
}

/// Typed event reconstructed from the response stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ContentDelta(String),
    ConversationMeta(Conversation),
    Usage(Usage),
    Cost(Cost),
    NewIds(NewIds),
    OptimizationNotice(OptimizationNotice),
    /// Final assistant message, synthesized right before `StreamEnd`
    AssistantReply(Message),
    StreamEnd,
}

impl StreamEvent {
    pub fn is_end(&self) -> bool {
        matches!(self, StreamEvent::StreamEnd)
    }
}

// ============================================================================
// Outgoing Request
// ============================================================================

fn serialize_as_single_element<S>(message: &Message, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    [message].serialize(serializer)
}

/// Body of `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingRequest {
    pub model: String,
    #[serde(rename = "messages", serialize_with = "serialize_as_single_element")]
    pub new_message: Message,
    #[serde(rename = "max_tokens")]
    pub max_output_tokens: u32,
    #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(rename = "chatHistory")]
    pub history: Vec<Message>,
}

impl OutgoingRequest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialized size in bytes
    pub fn serialized_size(&self) -> serde_json::Result<usize> {
        serde_json::to_vec(self).map(|v| v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_role_conversion() {
        assert_eq!(serde_json::to_value(Role::User).unwrap(), serde_json::json!("user"));
        assert_eq!(serde_json::from_str::<Role>("\"assistant\"").unwrap(), Role::Assistant);
        assert!(serde_json::from_str::<Role>("\"tool\"").is_err());
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_message_wire_format() {
        let msg = Message::new("c-1", Role::User, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"chatId": "c-1", "role": "user", "content": "hi", "updated": false})
        );
    }

    #[test]
    fn test_message_null_content() {
        let msg: Message =
            serde_json::from_str(r#"{"chatId":"a","role":"assistant","content":null}"#).unwrap();
        assert_eq!(msg.content, "");
        assert!(!msg.updated);
    }

    #[test]
    fn test_placeholder_ids_are_unique() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert!(a.has_placeholder_id());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_outgoing_request_wire_format() {
        let request = OutgoingRequest {
            model: "m".to_string(),
            new_message: Message::new("temp-1", Role::User, "hello"),
            max_output_tokens: 100,
            conversation_id: None,
            history: vec![Message::new("a", Role::Assistant, "prev")],
        };
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 100);
        assert!(json.get("conversationId").is_none());
        assert_eq!(json["chatHistory"][0]["chatId"], "a");
        assert_eq!(
            request.serialized_size().unwrap(),
            request.to_json().unwrap().len()
        );
    }

    #[test]
    fn test_conversation_from_wire() {
        let conv: Conversation = serde_json::from_str(
            r#"{"conversationId":"c9","title":"Greeting","lastMessageAt":"2024-05-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(conv.id, "c9");
        assert_eq!(conv.title, "Greeting");
        assert!(conv.last_message_at.is_some());
        assert!(conv.created_at.is_none());
    }

    #[test]
    fn test_usage_total_falls_back_to_sum() {
        let usage = Usage { prompt_tokens: 3, completion_tokens: 4, total_tokens: None };
        assert_eq!(usage.total(), 7);
    }
}
