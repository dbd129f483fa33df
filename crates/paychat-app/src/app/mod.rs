pub mod commands;
pub mod render;
pub mod repl;
pub mod setup;
pub mod task;

pub use commands::ReplCommand;
pub use repl::run_repl_mode;
pub use setup::{setup_from_cli, AppConfig, Services};
pub use task::{run_message_mode, run_subcommand};
