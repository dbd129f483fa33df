//! Stored conversations on the server.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use paychat_llm_api::auth::{authorize, CredentialProvider};
use paychat_llm_api::client::error_from_response;
use paychat_llm_api::config::{endpoint, CHAT_HISTORY_PATH, CONVERSATIONS_PATH};
use paychat_llm_api::Result;
use paychat_types::{Conversation, Message, Role};

/// Page size used when pulling a whole conversation
const HISTORY_PAGE_LIMIT: u32 = 100;

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

pub type ConversationPage = Paginated<Conversation>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredPrompt {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredContent {
    #[serde(default)]
    pub prompt: Vec<StoredPrompt>,
    #[serde(default)]
    pub response: String,
}

/// One prompt/response pair as stored by the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExchange {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    pub content: StoredContent,
}

/// Expand stored exchanges into alternating user/assistant messages.
pub fn exchanges_to_messages(conversation_id: &str, exchanges: &[StoredExchange]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(exchanges.len() * 2);
    for (i, exchange) in exchanges.iter().enumerate() {
        let prompt = exchange
            .content
            .prompt
            .first()
            .map(|p| p.content.clone())
            .unwrap_or_default();
        messages.push(Message::new(format!("user-{}-{}", conversation_id, i), Role::User, prompt));
        messages.push(Message::new(
            format!("assistant-{}-{}", conversation_id, i),
            Role::Assistant,
            exchange.content.response.clone(),
        ));
    }
    messages
}

/// Server-side conversation history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Most recently active conversations first
    async fn list_conversations(&self, page: u32, limit: u32) -> Result<ConversationPage>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<()>;

    /// Full message list of a stored conversation
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;
}

/// Store backed by the server's REST endpoints
pub struct HttpConversationStore {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpConversationStore {
    pub fn new(base_url: &str, client: reqwest::Client, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            base_url: base_url.to_string(),
            client,
            credentials,
        }
    }

    async fn history_page(&self, conversation_id: &str, page: u32) -> Result<Paginated<StoredExchange>> {
        let url = endpoint(&self.base_url, &format!("{}/{}", CHAT_HISTORY_PATH, conversation_id));
        let request = self
            .client
            .get(url)
            .query(&[("page", page.to_string()), ("limit", HISTORY_PAGE_LIMIT.to_string())]);
        let response = authorize(request, self.credentials.as_ref()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body, "Failed to fetch chat history"));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ConversationStore for HttpConversationStore {
    async fn list_conversations(&self, page: u32, limit: u32) -> Result<ConversationPage> {
        let request = self.client.get(endpoint(&self.base_url, CONVERSATIONS_PATH)).query(&[
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("sortBy", "lastMessageAt:desc".to_string()),
        ]);
        let response = authorize(request, self.credentials.as_ref()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body, "Failed to fetch conversations"));
        }
        Ok(response.json().await?)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &format!("{}/{}", CONVERSATIONS_PATH, conversation_id));
        let response = authorize(self.client.delete(url), self.credentials.as_ref())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body, "Failed to delete conversation"));
        }
        Ok(())
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let mut exchanges = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.history_page(conversation_id, page).await?;
            let done = batch.results.is_empty() || page >= batch.total_pages;
            exchanges.extend(batch.results);
            if done {
                break;
            }
            page += 1;
        }
        log::debug!("Loaded {} stored exchanges for {}", exchanges.len(), conversation_id);
        Ok(exchanges_to_messages(conversation_id, &exchanges))
    }
}
