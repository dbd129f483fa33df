use std::sync::Arc;

use crate::auth::{CredentialProvider, StaticCredential};

pub mod factory;
pub use factory::SessionFactory;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Streaming chat endpoint
pub const CHAT_STREAM_PATH: &str = "/chat/stream";

/// Model catalog endpoint
pub const MODELS_PATH: &str = "/llm/models";

/// Stored conversation list endpoint
pub const CONVERSATIONS_PATH: &str = "/conversations";

/// Stored chat history endpoint, followed by `/{conversation_id}`
pub const CHAT_HISTORY_PATH: &str = "/chat/conversation";

/// Normalize an API base URL by dropping trailing slashes and whitespace
pub fn normalize_api_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", normalize_api_url(base_url), path.trim_start_matches('/'))
}

/// Connection settings shared by the session, catalog and store
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub credentials: Arc<dyn CredentialProvider>,
    /// Print requests and stream chunks to the console
    pub verbose: bool,
    /// Keep request logs under ~/.paychat/logs
    pub log_requests: bool,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_api_url(base_url),
            credentials: Arc::new(StaticCredential::anonymous()),
            verbose: false,
            log_requests: false,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.credentials = Arc::new(match token {
            Some(token) => StaticCredential::new(token),
            None => StaticCredential::anonymous(),
        });
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.credentials.bearer_token().is_some())
            .field("verbose", &self.verbose)
            .field("log_requests", &self.log_requests)
            .finish()
    }
}
