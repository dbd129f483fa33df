//! Model catalog: the list of models the server offers and their limits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{authorize, CredentialProvider};
use crate::client::error_from_response;
use crate::config::{endpoint, MODELS_PATH};
use crate::error::Result;

/// Page size used to fetch the whole catalog in one request
const FULL_CATALOG_LIMIT: u32 = 1000;

/// Looks up per-model completion limits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Maximum completion tokens for `model_id`, `None` when unknown
    async fn max_completion_tokens(&self, model_id: &str) -> Result<Option<u32>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    #[serde(default)]
    pub tokenizer: Option<String>,
}

/// Per-token prices, as decimal strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub completion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopProvider {
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
    #[serde(default)]
    pub is_moderated: bool,
}

/// One entry of the model catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
    #[serde(default)]
    pub architecture: Option<ModelArchitecture>,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
    #[serde(default)]
    pub top_provider: Option<TopProvider>,
}

impl LlmModel {
    /// The model's own limit, else its top provider's
    pub fn completion_limit(&self) -> Option<u32> {
        self.max_completion_tokens
            .or_else(|| self.top_provider.as_ref().and_then(|p| p.max_completion_tokens))
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Models come back either as a flat list or grouped by provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelList {
    Flat(Vec<LlmModel>),
    Grouped(BTreeMap<String, Vec<LlmModel>>),
}

impl ModelList {
    pub fn into_flat(self) -> Vec<LlmModel> {
        match self {
            ModelList::Flat(models) => models,
            ModelList::Grouped(groups) => groups.into_values().flatten().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

/// One page of catalog results
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelPage {
    pub models: ModelList,
    #[serde(default)]
    pub pagination: Option<ModelPagination>,
}

#[derive(Debug, Deserialize)]
struct ModelsEnvelope {
    data: ModelPage,
}

/// Filters accepted by `GET /llm/models`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelQuery {
    pub search: Option<String>,
    pub modalities: Vec<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub group: Option<bool>,
}

impl ModelQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self { search: Some(term.into()), ..Self::default() }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.clone()));
        }
        if !self.modalities.is_empty() {
            pairs.push(("modalities", self.modalities.join(",")));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(group) = self.group {
            pairs.push(("group", group.to_string()));
        }
        pairs
    }
}

/// Catalog backed by the server's `/llm/models` endpoint
pub struct HttpModelCatalog {
    url: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    cache: Mutex<Option<Vec<LlmModel>>>,
}

impl HttpModelCatalog {
    pub fn new(base_url: &str, client: reqwest::Client, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            url: endpoint(base_url, MODELS_PATH),
            client,
            credentials,
            cache: Mutex::new(None),
        }
    }

    /// Fetch one page of models
    pub async fn get_models(&self, query: &ModelQuery) -> Result<ModelPage> {
        let request = self.client.get(&self.url).query(&query.to_query_pairs());
        let response = authorize(request, self.credentials.as_ref()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body, "Failed to fetch models"));
        }

        let envelope: ModelsEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// The whole catalog as a flat list, fetched once and cached
    pub async fn all_models(&self) -> Result<Vec<LlmModel>> {
        let mut cache = self.cache.lock().await;
        if let Some(models) = cache.as_ref() {
            return Ok(models.clone());
        }

        let query = ModelQuery { limit: Some(FULL_CATALOG_LIMIT), ..ModelQuery::default() };
        let models = self.get_models(&query).await?.models.into_flat();
        log::debug!("Loaded {} models from catalog", models.len());
        *cache = Some(models.clone());
        Ok(models)
    }

    /// Forget cached results so the next lookup refetches
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

#[async_trait]
impl ModelCatalog for HttpModelCatalog {
    async fn max_completion_tokens(&self, model_id: &str) -> Result<Option<u32>> {
        let models = self.all_models().await?;
        Ok(models
            .iter()
            .find(|m| m.id == model_id)
            .and_then(LlmModel::completion_limit))
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    limits: HashMap<String, u32>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model_id: impl Into<String>, max_completion_tokens: u32) -> Self {
        self.limits.insert(model_id.into(), max_completion_tokens);
        self
    }
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn max_completion_tokens(&self, model_id: &str) -> Result<Option<u32>> {
        Ok(self.limits.get(model_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model(json: serde_json::Value) -> LlmModel {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_completion_limit_prefers_model_value() {
        let m = model(serde_json::json!({
            "id": "a", "max_completion_tokens": 1000,
            "top_provider": {"max_completion_tokens": 2000}
        }));
        assert_eq!(m.completion_limit(), Some(1000));
    }

    #[test]
    fn test_completion_limit_falls_back_to_top_provider() {
        let m = model(serde_json::json!({
            "id": "a", "max_completion_tokens": null,
            "top_provider": {"context_length": 8000, "max_completion_tokens": 2000, "is_moderated": true}
        }));
        assert_eq!(m.completion_limit(), Some(2000));

        let bare = model(serde_json::json!({"id": "b"}));
        assert_eq!(bare.completion_limit(), None);
        assert_eq!(bare.display_name(), "b");
    }

    #[test]
    fn test_grouped_model_list_flattens() {
        let list: ModelList = serde_json::from_value(serde_json::json!({
            "anthropic": [{"id": "anthropic/claude"}],
            "openai": [{"id": "openai/gpt-4o"}, {"id": "openai/gpt-4o-mini"}]
        }))
        .unwrap();
        let ids: Vec<String> = list.into_flat().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["anthropic/claude", "openai/gpt-4o", "openai/gpt-4o-mini"]);
    }

    #[test]
    fn test_query_pairs() {
        let query = ModelQuery {
            search: Some("gpt".to_string()),
            modalities: vec!["text".to_string(), "image".to_string()],
            sort: None,
            page: Some(2),
            limit: Some(20),
            group: Some(true),
        };
        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("search", "gpt".to_string()),
                ("modalities", "text,image".to_string()),
                ("page", "2".to_string()),
                ("limit", "20".to_string()),
                ("group", "true".to_string()),
            ]
        );
        assert!(ModelQuery::search("").to_query_pairs().is_empty());
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let catalog = StaticCatalog::new().with_model("m", 512);
        assert_eq!(catalog.max_completion_tokens("m").await.unwrap(), Some(512));
        assert_eq!(catalog.max_completion_tokens("other").await.unwrap(), None);
    }
}
