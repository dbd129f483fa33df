use std::sync::Arc;

use crate::catalog::HttpModelCatalog;
use crate::client::HttpTransport;
use crate::config::ApiConfig;
use crate::session::StreamSession;

/// Builds the HTTP-backed pieces from one [`ApiConfig`].
///
/// Everything created by one factory shares a single connection pool.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: ApiConfig,
    client: reqwest::Client,
}

impl SessionFactory {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: ApiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Shared HTTP client, for callers that talk to other endpoints
    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::with_client(&self.config.base_url, self.client.clone())
            .verbose(self.config.verbose)
            .log_to_file(self.config.log_requests)
    }

    pub fn catalog(&self) -> Arc<HttpModelCatalog> {
        Arc::new(HttpModelCatalog::new(
            &self.config.base_url,
            self.client.clone(),
            self.config.credentials.clone(),
        ))
    }

    /// Session using the HTTP transport and the given catalog
    pub fn session_with_catalog(&self, catalog: Arc<HttpModelCatalog>) -> StreamSession {
        StreamSession::new(
            Arc::new(self.transport()),
            catalog,
            self.config.credentials.clone(),
        )
    }

    /// Session with its own catalog
    pub fn create(&self) -> StreamSession {
        self.session_with_catalog(self.catalog())
    }
}
