use anyhow::Result;
use clap::Parser;

use paychat::app::{run_message_mode, run_repl_mode, run_subcommand, setup_from_cli, Services};
use paychat::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "warn"
    }))
    .init();

    // Set up application configuration from CLI
    let app_config = setup_from_cli(&cli)?;

    // Listing subcommands never need a model
    if let Some(ref command) = cli.command {
        return run_subcommand(&Services::new(&app_config), command).await;
    }

    let services = Services::connect(&app_config).await?;

    // Handle one-shot mode if requested
    if let Some(message) = cli.message.clone() {
        return run_message_mode(services, message).await;
    }

    run_repl_mode(services).await
}
