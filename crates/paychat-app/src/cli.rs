use clap::{Parser, Subcommand};

use paychat_llm_api::DEFAULT_API_URL;

/// CLI arguments for paychat
#[derive(Parser, Debug)]
#[command(name = "paychat")]
#[command(about = "Paychat - streaming chat client for pay-per-use models")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// API base URL (e.g., https://example.com/api)
    #[arg(long, value_name = "URL", env = "PAYCHAT_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token sent with every request
    #[arg(long, value_name = "TOKEN", env = "PAYCHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Re-read the token from this environment variable before every
    /// request; takes precedence over --token
    #[arg(long, value_name = "VAR")]
    pub token_env: Option<String>,

    /// Model id; the first catalog entry is used when omitted
    #[arg(long, short = 'm', value_name = "MODEL", env = "PAYCHAT_MODEL")]
    pub model: Option<String>,

    /// Fixed completion limit instead of the model's catalog value
    #[arg(long, value_name = "N", env = "PAYCHAT_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Send one message, print the reply and exit
    #[arg(long, value_name = "TEXT")]
    pub message: Option<String>,

    /// Print requests and raw stream chunks
    #[arg(long, short = 'v', env = "PAYCHAT_VERBOSE")]
    pub verbose: bool,

    /// Keep a copy of every request under ~/.paychat/logs
    #[arg(long, env = "PAYCHAT_LOG_REQUESTS")]
    pub log_requests: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List available models
    Models {
        /// Filter by name or id
        search: Option<String>,
    },
    /// List stored conversations, most recent first
    Conversations {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}
