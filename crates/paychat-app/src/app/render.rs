//! Console rendering of controller events and errors.

use colored::Colorize;
use std::future::Future;
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;

use paychat_chat::{ControllerEvent, ControllerState, ConversationError};
use paychat_llm_api::ChatError;
use paychat_types::{Message, Role};

pub fn render_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::StateChanged(ControllerState::Sending) => {
            print!("{} ", "Assistant:".bright_blue().bold());
            let _ = std::io::stdout().flush();
        }
        ControllerEvent::Delta(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        ControllerEvent::Committed(_) => println!("\n"),
        ControllerEvent::Optimized(notice) => {
            eprintln!(
                "{} History optimized: kept {} of {} messages (~{} tokens saved)",
                "📉".yellow(),
                notice.kept_count,
                notice.original_count,
                notice.estimated_tokens_saved
            );
        }
        ControllerEvent::ConversationChanged(Some(conversation)) => {
            log::debug!("Conversation {} ({})", conversation.id, conversation.title);
        }
        ControllerEvent::Failed { .. } => println!(),
        _ => {}
    }
}

/// Run `future` while rendering events as they arrive, then flush whatever
/// is left in the channel.
pub async fn drive<F, T>(future: F, events: &mut UnboundedReceiver<ControllerEvent>) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(future);
    let output = loop {
        tokio::select! {
            output = &mut future => break output,
            Some(event) = events.recv() => render_event(&event),
        }
    };
    while let Ok(event) = events.try_recv() {
        render_event(&event);
    }
    output
}

/// User-facing wording for a failed operation
pub fn describe_error(err: &ConversationError) -> String {
    match err.chat_error() {
        Some(ChatError::InsufficientBalance(_)) => {
            "Insufficient balance. Please top up to continue.".to_string()
        }
        Some(e) if e.is_size_error() => {
            "Conversation history is too large. Please start a new conversation or clear some messages."
                .to_string()
        }
        Some(ChatError::Cancelled) => "Interrupted".to_string(),
        _ => err.to_string(),
    }
}

pub fn print_error(err: &ConversationError) {
    eprintln!("{} {}", "Error:".bright_red().bold(), describe_error(err));
    if let Some(unsent) = err.unsent_content().filter(|u| !u.is_empty()) {
        eprintln!("{} {}", "Not sent:".bright_black(), unsent);
    }
}

pub fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("{}", "No messages yet.".bright_black());
        return;
    }
    for (i, message) in messages.iter().enumerate() {
        let label = match message.role {
            Role::User => "You".bright_green().bold(),
            Role::Assistant => "Assistant".bright_blue().bold(),
            Role::System => "System".bright_black().bold(),
        };
        let edited = if message.updated { " (edited)".bright_black().to_string() } else { String::new() };
        println!("[{}] {}{}: {}", i + 1, label, edited, message.content);
    }
}
