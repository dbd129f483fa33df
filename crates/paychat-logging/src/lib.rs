// Logging module - request, response and stream debugging
pub mod request_logger;

use std::path::PathBuf;
use anyhow::{Result, Context};

pub use request_logger::{
    log_request,
    log_request_to_file,
    log_response,
    log_response_to_file,
    log_stream_chunk,
    redact_token,
    write_request_log,
};

/// Safely truncate a string to a maximum number of characters
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        // Reserve space for "..." suffix
        let trunc_chars = max_chars.saturating_sub(3);
        format!("{}...", s.chars().take(trunc_chars).collect::<String>())
    }
}

/// Get or create the base paychat directory (~/.paychat)
pub fn get_paychat_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Failed to get home directory")?;

    let paychat_dir = PathBuf::from(home_dir).join(".paychat");

    if !paychat_dir.exists() {
        std::fs::create_dir_all(&paychat_dir)
            .context("Failed to create paychat directory")?;
    }

    Ok(paychat_dir)
}

/// Get or create the logs directory (~/.paychat/logs)
pub fn get_logs_dir() -> Result<PathBuf> {
    let logs_dir = get_paychat_dir()?.join("logs");

    if !logs_dir.exists() {
        std::fs::create_dir_all(&logs_dir)
            .context("Failed to create logs directory")?;
    }

    Ok(logs_dir)
}
