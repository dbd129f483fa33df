//! Incremental decoder for the `data: ` framed response stream.
//!
//! Network chunk boundaries carry no meaning: bytes are decoded to text
//! incrementally, split into lines, and only complete lines are turned into
//! [`StreamEvent`]s. A trailing partial line waits for more bytes.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use paychat_types::{Conversation, Cost, NewIds, OptimizationNotice, StreamEvent, Usage};

use crate::error::{ChatError, Result};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// UTF-8 decoder that holds incomplete code units between chunks.
///
/// Invalid sequences decode to U+FFFD, like a browser `TextDecoder`.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..start + valid]));
                    start += valid;
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += len;
                        }
                        // incomplete sequence at the end, wait for more bytes
                        None => break,
                    }
                }
            }
        }

        self.pending.drain(..start);
    }

    fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
    }
}

// Wire shapes of the fields of one frame. Each field is decoded on its own so
// a field with an unexpected shape only loses that field.

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: Option<WireDelta>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChatRef {
    #[serde(rename = "chatId")]
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct WireNewChats {
    #[serde(rename = "userChat")]
    user_chat: WireChatRef,
    #[serde(rename = "assistantChat", default)]
    assistant_chat: Option<WireChatRef>,
}

#[derive(Debug, Deserialize)]
struct WireOptimizationInfo {
    #[serde(rename = "originalHistoryLength", default)]
    original_history_length: usize,
    #[serde(rename = "optimizedHistoryLength", default)]
    optimized_history_length: usize,
    #[serde(rename = "tokensSaved", default)]
    tokens_saved: u64,
    #[serde(rename = "updatedChatsCount", default)]
    updated_chats_count: Option<u64>,
}

/// Take `key` out of the frame and decode it. Absent and null fields yield
/// `None`; a field that does not decode is logged and skipped.
fn take_field<T: DeserializeOwned>(frame: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = frame.remove(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            log::warn!("Ignoring `{}` field of stream frame: {}", key, e);
            None
        }
    }
}

fn frame_events(mut frame: Map<String, Value>) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    let content = take_field::<Vec<WireChoice>>(&mut frame, "choices")
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    if let Some(text) = content.filter(|t| !t.is_empty()) {
        events.push(StreamEvent::ContentDelta(text));
    }
    if let Some(conversation) = take_field::<Conversation>(&mut frame, "conversation") {
        events.push(StreamEvent::ConversationMeta(conversation));
    }
    if let Some(usage) = take_field::<Usage>(&mut frame, "usage") {
        events.push(StreamEvent::Usage(usage));
    }
    if let Some(cost) = take_field::<Cost>(&mut frame, "cost") {
        events.push(StreamEvent::Cost(cost));
    }
    if let Some(new_chats) = take_field::<WireNewChats>(&mut frame, "newChats") {
        events.push(StreamEvent::NewIds(NewIds {
            user_message_id: new_chats.user_chat.chat_id,
            assistant_message_id: new_chats.assistant_chat.map(|chat| chat.chat_id),
        }));
    }
    if let Some(info) = take_field::<WireOptimizationInfo>(&mut frame, "optimizationInfo") {
        events.push(StreamEvent::OptimizationNotice(OptimizationNotice {
            original_count: info.original_history_length,
            kept_count: info.optimized_history_length,
            estimated_tokens_saved: info.tokens_saved,
            updated_count: info.updated_chats_count,
        }));
    }

    events
}

/// Decode one complete line into zero or more events.
///
/// Lines without the `data: ` prefix and the `[DONE]` sentinel produce no
/// events. A payload that is not a JSON object yields
/// [`ChatError::MalformedFrame`]; a recognized field with an unexpected
/// shape is skipped without losing the rest of the frame.
pub fn decode_line(line: &str) -> Result<Vec<StreamEvent>> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(Vec::new());
    };

    // the upstream server sometimes prefixes a payload twice
    let mut payload = rest.trim();
    if let Some(again) = payload.strip_prefix(DATA_PREFIX) {
        payload = again.trim();
    }

    if payload == DONE_SENTINEL {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(frame)) => Ok(frame_events(frame)),
        Ok(_) => Err(ChatError::MalformedFrame(format!("not a JSON object: {}", payload))),
        Err(e) => Err(ChatError::MalformedFrame(format!("{}: {}", e, payload))),
    }
}

/// Turns a chunked byte stream into [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    frames: usize,
    malformed: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning the events of every line it
    /// completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.utf8.decode(chunk, &mut self.buffer);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        let mut events = Vec::new();
        for line in complete.split('\n') {
            if line.is_empty() {
                continue;
            }
            self.frames += 1;
            match decode_line(line) {
                Ok(mut decoded) => events.append(&mut decoded),
                Err(err) => {
                    self.malformed += 1;
                    log::warn!("Skipping stream frame: {}", err);
                }
            }
        }
        events
    }

    /// Transport reached end-of-data. An unterminated line is incomplete and
    /// is dropped.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.utf8.finish(&mut self.buffer);
        if !self.buffer.is_empty() {
            log::debug!(
                "Discarding {} bytes of unterminated frame at end of stream",
                self.buffer.len()
            );
            self.buffer.clear();
        }
        vec![StreamEvent::StreamEnd]
    }

    /// Number of non-empty lines seen so far
    pub fn frames_seen(&self) -> usize {
        self.frames
    }

    /// Number of frames skipped because they failed to parse
    pub fn malformed_frames(&self) -> usize {
        self.malformed
    }
}
