use anyhow::{Context, Result};
use colored::Colorize;

use paychat_llm_api::ModelQuery;

use super::render::{describe_error, drive};
use super::setup::Services;
use crate::cli::Commands;

/// Send a single message and print the streamed reply
pub async fn run_message_mode(mut services: Services, message: String) -> Result<()> {
    let mut events = services.controller.subscribe();
    let result = drive(services.controller.send(message), &mut events).await;

    match result {
        Ok(_) => {
            let totals = services.controller.totals();
            log::info!(
                "{} prompt + {} completion tokens, ${:.4}",
                totals.prompt_tokens,
                totals.completion_tokens,
                totals.cost.usd
            );
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!(describe_error(&err))),
    }
}

/// Execute a listing subcommand
pub async fn run_subcommand(services: &Services, command: &Commands) -> Result<()> {
    match command {
        Commands::Models { search } => {
            let query = search.clone().map(ModelQuery::search).unwrap_or_default();
            let page = services
                .catalog
                .get_models(&query)
                .await
                .context("Failed to fetch models")?;
            for model in page.models.into_flat() {
                println!("{}\t{}", model.id, model.display_name().bright_black());
            }
        }
        Commands::Conversations { page, limit } => {
            let listing = services
                .controller
                .list_conversations(*page, *limit)
                .await
                .context("Failed to fetch conversations")?;
            for conversation in &listing.results {
                println!("{}\t{}", conversation.id, conversation.title);
            }
            println!(
                "{}",
                format!("page {} of {} ({} total)", listing.page, listing.total_pages, listing.total_results)
                    .bright_black()
            );
        }
    }
    Ok(())
}
