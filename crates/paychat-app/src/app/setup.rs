use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use paychat_chat::{ConversationController, HttpConversationStore};
use paychat_llm_api::{ApiConfig, CredentialProvider, EnvCredential, HttpModelCatalog, SessionFactory};

use crate::cli::Cli;

/// Application configuration derived from CLI arguments and environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

/// Set up application configuration from CLI arguments.
///
/// Precedence: CLI flags > PAYCHAT_* env > defaults (clap resolves the
/// first two).
pub fn setup_from_cli(cli: &Cli) -> Result<AppConfig> {
    let api = ApiConfig::new(&cli.api_url);
    let mut api = match cli.token_env.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(var) => api.with_credentials(Arc::new(EnvCredential::new(var))),
        None => api.with_token(cli.token.clone().filter(|t| !t.trim().is_empty())),
    };
    if api.credentials.bearer_token().is_none() {
        eprintln!(
            "{} No token configured (--token, --token-env or PAYCHAT_TOKEN); requests are sent unauthenticated",
            "⚠️".yellow()
        );
    }

    api.verbose = cli.verbose;
    api.log_requests = cli.log_requests;

    if api.base_url.is_empty() {
        anyhow::bail!("API URL must not be empty");
    }

    Ok(AppConfig {
        api,
        model: cli.model.clone().filter(|m| !m.trim().is_empty()),
        max_output_tokens: cli.max_tokens,
    })
}

/// Everything the front end talks to, sharing one HTTP connection pool
pub struct Services {
    pub controller: ConversationController,
    pub catalog: Arc<HttpModelCatalog>,
}

impl Services {
    /// Wire everything up without touching the network
    pub fn new(config: &AppConfig) -> Self {
        let factory = SessionFactory::new(config.api.clone());
        let catalog = factory.catalog();

        let store = HttpConversationStore::new(
            &config.api.base_url,
            factory.http_client(),
            config.api.credentials.clone(),
        );

        let model = config.model.clone().unwrap_or_default();
        let controller = ConversationController::new(factory.session_with_catalog(catalog.clone()), model)
            .with_store(Arc::new(store))
            .with_max_output_tokens(config.max_output_tokens);

        Self { controller, catalog }
    }

    /// Like [`Services::new`], picking the first catalog model when none
    /// was configured
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let mut services = Self::new(config);
        if config.model.is_none() {
            let model = default_model(&services.catalog).await?;
            services.controller.set_model(model);
        }
        Ok(services)
    }
}

async fn default_model(catalog: &HttpModelCatalog) -> Result<String> {
    let models = catalog
        .all_models()
        .await
        .context("Failed to fetch models; pass --model to skip the lookup")?;
    let first = models
        .first()
        .context("The server offers no models")?;
    log::info!("Using default model {}", first.id);
    Ok(first.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_setup_normalizes_url_and_keeps_flags() {
        let cli = Cli::try_parse_from([
            "paychat",
            "--api-url",
            " https://chat.example.com/api/ ",
            "--token",
            "secret",
            "--model",
            "m",
            "--log-requests",
        ])
        .unwrap();

        let config = setup_from_cli(&cli).unwrap();

        assert_eq!(config.api.base_url, "https://chat.example.com/api");
        assert_eq!(config.api.credentials.bearer_token().as_deref(), Some("secret"));
        assert!(config.api.log_requests);
        assert_eq!(config.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let cli = Cli::try_parse_from(["paychat", "--token", "  ", "--model", ""]).unwrap();

        let config = setup_from_cli(&cli).unwrap();

        assert_eq!(config.api.credentials.bearer_token(), None);
        assert_eq!(config.model, None);
    }

    #[test]
    fn test_token_env_is_read_per_request() {
        let var = "PAYCHAT_SETUP_TEST_ROTATING_TOKEN";
        std::env::set_var(var, "first");
        let cli = Cli::try_parse_from(["paychat", "--token", "static", "--token-env", var]).unwrap();

        let config = setup_from_cli(&cli).unwrap();
        assert_eq!(config.api.credentials.bearer_token().as_deref(), Some("first"));

        std::env::set_var(var, "second");
        assert_eq!(config.api.credentials.bearer_token().as_deref(), Some("second"));

        std::env::remove_var(var);
        assert_eq!(config.api.credentials.bearer_token(), None);
    }
}
