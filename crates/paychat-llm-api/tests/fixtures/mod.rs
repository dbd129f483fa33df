use serde_json::{json, Value};
use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token-abcdef";

/// Mock paychat server for exercising the HTTP clients
pub struct PaychatMockServer {
    server: MockServer,
}

impl PaychatMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL in the same shape as the real `/api` prefix
    pub fn api_url(&self) -> String {
        format!("{}/api", self.server.uri())
    }

    /// Streaming endpoint answering with the given `data: ` lines
    pub async fn mock_chat_stream(&self, expected_body: Value, lines: &[Value]) {
        let body: String = lines
            .iter()
            .map(|line| format!("data: {}\n\n", line))
            .chain(std::iter::once("data: [DONE]\n\n".to_string()))
            .collect();

        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(header("Authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(expected_body))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(body),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Streaming endpoint failing with a JSON error body
    pub async fn mock_chat_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "success": false,
                "message": message
            })))
            .mount(&self.server)
            .await;
    }

    /// Model catalog answering any query, expected to be hit `times` times
    pub async fn mock_models(&self, models: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path("/api/llm/models"))
            .and(header("Authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "models": models,
                    "pagination": {"page": 1, "limit": 1000, "total": 2, "totalPages": 1, "hasNext": false, "hasPrev": false}
                }
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }
}

pub fn delta(text: &str) -> Value {
    json!({"choices": [{"delta": {"content": text}}]})
}

pub fn sample_models() -> Value {
    json!([
        {
            "id": "openai/gpt-4o-mini",
            "name": "GPT-4o mini",
            "context_length": 128000,
            "max_completion_tokens": 16384,
            "pricing": {"prompt": "0.00000015", "completion": "0.0000006"}
        },
        {
            "id": "meta/llama-3-70b",
            "name": "Llama 3 70B",
            "max_completion_tokens": null,
            "top_provider": {"context_length": 8192, "max_completion_tokens": 2048, "is_moderated": false}
        }
    ])
}
