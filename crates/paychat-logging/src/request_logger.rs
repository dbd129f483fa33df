use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{get_logs_dir, safe_truncate};

const CONSOLE_BODY_LIMIT: usize = 5000;

/// Show only the first characters of a bearer token
pub fn redact_token(token: &str) -> String {
    format!("{}***", token.chars().take(10).collect::<String>())
}

fn describe_url(url: &str) -> Vec<(&'static str, String)> {
    let mut parts = vec![("URL", url.to_string())];
    if let Ok(parsed_url) = reqwest::Url::parse(url) {
        parts.push(("Host", parsed_url.host_str().unwrap_or("unknown").to_string()));
        parts.push((
            "Port",
            parsed_url.port().map(|p| p.to_string()).unwrap_or_else(|| {
                if parsed_url.scheme() == "https" { "443 (default)".to_string() } else { "80 (default)".to_string() }
            }),
        ));
        parts.push(("Scheme", parsed_url.scheme().to_string()));
    }
    parts
}

fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

/// Log HTTP request details for debugging (console output)
pub fn log_request(url: &str, body: &str, token: Option<&str>, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_cyan());
    println!("{}", "🔍 HTTP REQUEST DEBUG".bright_cyan().bold());
    println!("{}", "═".repeat(80).bright_cyan());

    for (label, value) in describe_url(url) {
        println!("{}: {}", label.bright_yellow(), value);
    }

    println!("\n{}", "Headers:".bright_yellow());
    println!("  Content-Type: application/json");
    if let Some(token) = token {
        println!("  Authorization: Bearer {}", redact_token(token));
    }

    println!("\n{}", "Request Body:".bright_yellow());
    let json = pretty_body(body);
    if json.chars().count() > CONSOLE_BODY_LIMIT {
        println!("{}", safe_truncate(&json, CONSOLE_BODY_LIMIT));
        println!("\n{}", format!("... (truncated, total {} bytes)", body.len()).bright_black());
    } else {
        println!("{}", json);
    }

    println!("{}", "═".repeat(80).bright_cyan());
    println!();
}

/// Write a request log into `logs_dir`, returning the file written
pub fn write_request_log(
    logs_dir: &Path,
    url: &str,
    body: &str,
    model: &str,
    token: Option<&str>,
) -> Result<PathBuf> {
    let timestamp = Local::now();
    let model_name = model.replace('/', "-");
    let filename = format!("req-{}-{}.txt", timestamp.format("%Y%m%d-%H%M%S%3f"), model_name);
    let file_path = logs_dir.join(filename);

    let mut log_content = String::new();
    log_content.push_str("HTTP REQUEST LOG\n");
    log_content.push_str("================\n\n");
    log_content.push_str(&format!("Timestamp: {}\n", timestamp.to_rfc3339()));
    log_content.push_str(&format!("Model: {}\n\n", model));

    for (label, value) in describe_url(url) {
        log_content.push_str(&format!("{}: {}\n", label, value));
    }

    log_content.push_str("\nHeaders:\n");
    log_content.push_str("  Content-Type: application/json\n");
    if let Some(token) = token {
        log_content.push_str(&format!("  Authorization: Bearer {}\n", redact_token(token)));
    }

    log_content.push_str("\nRequest Body:\n");
    log_content.push_str(&pretty_body(body));
    log_content.push('\n');
    log_content.push_str(&format!("\n---\nRequest Size: {} bytes\n", body.len()));

    fs::write(&file_path, log_content)
        .with_context(|| format!("Failed to write request log to {}", file_path.display()))?;

    Ok(file_path)
}

/// Log HTTP request to ~/.paychat/logs for persistent debugging
pub fn log_request_to_file(url: &str, body: &str, model: &str, token: Option<&str>) -> Result<PathBuf> {
    let logs_dir = get_logs_dir()?;
    let path = write_request_log(&logs_dir, url, body, model, token)?;

    println!("{}", format!("📝 Request logged to: {}", path.display()).bright_blue());

    Ok(path)
}

/// Log a failed HTTP response to ~/.paychat/logs
pub fn log_response_to_file(status: &reqwest::StatusCode, body: &str, model: &str) -> Result<PathBuf> {
    let logs_dir = get_logs_dir()?;
    let timestamp = Local::now();
    let filename = format!(
        "resp-{}-{}.txt",
        timestamp.format("%Y%m%d-%H%M%S%3f"),
        model.replace('/', "-")
    );
    let file_path = logs_dir.join(filename);

    let mut log_content = String::new();
    log_content.push_str("HTTP RESPONSE LOG\n");
    log_content.push_str("=================\n\n");
    log_content.push_str(&format!("Timestamp: {}\n", timestamp.to_rfc3339()));
    log_content.push_str(&format!("Model: {}\n\n", model));
    log_content.push_str(&format!(
        "Status: {} {}\n\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    ));
    log_content.push_str("Response Body:\n");
    log_content.push_str(&pretty_body(body));
    log_content.push('\n');

    fs::write(&file_path, log_content)
        .with_context(|| format!("Failed to write response log to {}", file_path.display()))?;

    println!("{}", format!("📄 Response logged to: {}", file_path.display()).bright_blue());

    Ok(file_path)
}

/// Log HTTP response details for debugging (console output)
pub fn log_response(status: &reqwest::StatusCode, body: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_green());
    println!("{}", "📥 HTTP RESPONSE DEBUG".bright_green().bold());
    println!("{}", "═".repeat(80).bright_green());

    println!("{}: {} {}",
        "Status".bright_yellow(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    println!("\n{}", "Response Body:".bright_yellow());
    let pretty = pretty_body(body);
    if pretty.chars().count() > CONSOLE_BODY_LIMIT {
        println!("{}", safe_truncate(&pretty, CONSOLE_BODY_LIMIT));
        println!("\n{}", format!("... (truncated, total {} bytes)", body.len()).bright_black());
    } else {
        println!("{}", pretty);
    }

    println!("{}", "═".repeat(80).bright_green());
    println!();
}

/// Log streaming chunk for debugging (console output)
pub fn log_stream_chunk(chunk_num: usize, data: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("{}", format!("📦 Stream Chunk #{}: {}", chunk_num,
        if data.chars().count() > 200 {
            format!("{}... ({} bytes)", safe_truncate(data, 200), data.len())
        } else {
            data.to_string()
        }
    ).bright_black());
}
