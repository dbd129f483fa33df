use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc::UnboundedReceiver;

use paychat_chat::{ControllerEvent, EditOutcome};
use paychat_llm_api::ModelQuery;
use paychat_types::Conversation;

use super::commands::{ReplCommand, HELP};
use super::render::{drive, print_error, print_history};
use super::setup::Services;

const CONVERSATION_PAGE_SIZE: u32 = 20;

/// Run interactive REPL mode
pub async fn run_repl_mode(mut services: Services) -> Result<()> {
    println!("{}", "💬 Paychat".bright_cyan().bold());
    println!("{}", "Type /help for commands, /quit to exit\n".bright_black());

    let mut events = services.controller.subscribe();
    let mut listing: Vec<Conversation> = Vec::new();
    let mut rl = DefaultEditor::new()?;

    // One Ctrl-C handler for the whole session; it interrupts the exchange
    // in flight, if any
    let canceller = services.controller.canceller();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_ok() && canceller.cancel() {
                println!("\n{}", "^C - Interrupting...".bright_yellow());
            }
        }
    });

    loop {
        let model_indicator = format!("[{}]", services.controller.model()).bright_magenta();
        let readline = rl.readline(&format!("{} {} ", model_indicator, "You:".bright_green().bold()));

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".bright_black());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".bright_red().bold(), err);
                break;
            }
        };

        let command = match ReplCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                eprintln!("{} {}", "❌".bright_red(), usage);
                continue;
            }
        };
        rl.add_history_entry(line.trim())?;

        if command == ReplCommand::Quit {
            println!("{}", "Goodbye!".bright_cyan());
            break;
        }

        run_command(&mut services, command, &mut events, &mut listing).await;
    }

    let totals = services.controller.totals();
    if totals.total_tokens() > 0 {
        println!(
            "{}",
            format!(
                "Session: {} tokens (prompt {}, completion {}), ${:.4}",
                totals.total_tokens(),
                totals.prompt_tokens,
                totals.completion_tokens,
                totals.cost.usd
            )
            .bright_black()
        );
    }
    Ok(())
}

async fn run_command(
    services: &mut Services,
    command: ReplCommand,
    events: &mut UnboundedReceiver<ControllerEvent>,
    listing: &mut Vec<Conversation>,
) {
    let controller = &mut services.controller;

    match command {
        ReplCommand::Send(text) => {
            if let Err(err) = drive(controller.send(text), events).await {
                print_error(&err);
            }
        }
        ReplCommand::Edit { index, content } => match drive(controller.edit(index, content), events).await {
            Ok(EditOutcome::Unchanged) => println!("{}", "No change.".bright_black()),
            Ok(EditOutcome::Edited) => println!("{} Message {} updated", "✏️".bright_green(), index + 1),
            Ok(EditOutcome::Resent(_)) => {}
            Err(err) => print_error(&err),
        },
        ReplCommand::Regenerate(index) => {
            if let Err(err) = drive(controller.regenerate(index), events).await {
                print_error(&err);
            }
        }
        ReplCommand::New => {
            controller.clear();
            while events.try_recv().is_ok() {}
            println!("{}", "Started a new chat.".bright_cyan());
        }
        ReplCommand::History => {
            if let Some(conversation) = controller.conversation() {
                println!("{}", format!("Conversation: {}", conversation.title).bright_black());
            }
            print_history(controller.messages());
        }
        ReplCommand::Models(search) => {
            let query = search.map(ModelQuery::search).unwrap_or_default();
            match services.catalog.get_models(&query).await {
                Ok(page) => {
                    for model in page.models.into_flat() {
                        let limit = model
                            .completion_limit()
                            .map(|l| format!(" (max {} tokens)", l))
                            .unwrap_or_default();
                        println!("  {} {}{}", model.id.bright_white(), model.display_name().bright_black(), limit.bright_black());
                    }
                }
                Err(err) => eprintln!("{} Failed to fetch models: {}", "❌".bright_red(), err),
            }
        }
        ReplCommand::Model(model) => {
            controller.set_model(model);
            println!("{} Using model {}", "🤖".cyan(), controller.model());
        }
        ReplCommand::Conversations => match controller.list_conversations(1, CONVERSATION_PAGE_SIZE).await {
            Ok(page) => {
                if page.results.is_empty() {
                    println!("{}", "No stored conversations.".bright_black());
                }
                for (i, conversation) in page.results.iter().enumerate() {
                    let when = conversation
                        .last_message_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("[{}] {} {}", i + 1, conversation.title, when.bright_black());
                }
                *listing = page.results;
            }
            Err(err) => print_error(&err),
        },
        ReplCommand::Open(position) => match listing.get(position).cloned() {
            Some(conversation) => match controller.load_conversation(conversation).await {
                Ok(()) => {
                    while events.try_recv().is_ok() {}
                    print_history(controller.messages());
                }
                Err(err) => print_error(&err),
            },
            None => eprintln!("{} Run /conversations first", "❌".bright_red()),
        },
        ReplCommand::Delete(position) => match listing.get(position).cloned() {
            Some(conversation) => match controller.delete_conversation(&conversation.id).await {
                Ok(()) => {
                    listing.remove(position);
                    while events.try_recv().is_ok() {}
                    println!("{} Deleted '{}'", "🗑️".bright_green(), conversation.title);
                }
                Err(err) => print_error(&err),
            },
            None => eprintln!("{} Run /conversations first", "❌".bright_red()),
        },
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
}
