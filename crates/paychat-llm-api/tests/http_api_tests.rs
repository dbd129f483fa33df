mod fixtures;

use fixtures::{delta, sample_models, PaychatMockServer, TEST_TOKEN};
use paychat_llm_api::{
    ApiConfig, ChatError, ModelCatalog, ModelQuery, SendIntent, SessionFactory,
};
use paychat_types::{Message, Role, StreamEvent};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

fn factory(server: &PaychatMockServer) -> SessionFactory {
    SessionFactory::new(ApiConfig::new(&server.api_url()).with_token(Some(TEST_TOKEN.to_string())))
}

#[tokio::test]
async fn test_stream_session_over_http() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = PaychatMockServer::new().await;
    server
        .mock_chat_stream(
            json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 512,
                "messages": [{"role": "user", "content": "Hi"}],
                "chatHistory": []
            }),
            &[
                delta("Hello"),
                delta(" there"),
                json!({
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7},
                    "cost": {"usd": 0.001, "idr": 16.5},
                    "newChats": {"userChat": {"chatId": "u-1"}, "assistantChat": {"chatId": "a-1"}}
                }),
            ],
        )
        .await;

    let session = factory(&server).create();
    let intent = SendIntent::new("openai/gpt-4o-mini", Message::user("Hi")).with_max_output_tokens(Some(512));
    let events = assert_ok!(session.collect(intent).await);

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello there");
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Usage(u) if u.total() == 7)));
    assert!(events.contains(&StreamEvent::AssistantReply(Message::new(
        "a-1",
        Role::Assistant,
        "Hello there"
    ))));
    assert_eq!(events.last(), Some(&StreamEvent::StreamEnd));
}

#[tokio::test]
async fn test_payment_required_maps_to_insufficient_balance() {
    let server = PaychatMockServer::new().await;
    server.mock_chat_error(402, "Insufficient balance. Please top up.").await;

    let session = factory(&server).create();
    let intent = SendIntent::new("m", Message::user("Hi")).with_max_output_tokens(Some(10));
    let err = assert_err!(session.collect(intent).await);

    assert_eq!(err, ChatError::InsufficientBalance("Insufficient balance. Please top up.".to_string()));
}

#[tokio::test]
async fn test_unwritable_log_dir_does_not_mask_api_error() {
    let _ = env_logger::builder().is_test(true).try_init();
    let not_a_dir = tempfile::NamedTempFile::new().unwrap();
    std::env::set_var("HOME", not_a_dir.path());

    let server = PaychatMockServer::new().await;
    server.mock_chat_error(400, "Model not found").await;

    let mut config = ApiConfig::new(&server.api_url()).with_token(Some(TEST_TOKEN.to_string()));
    config.log_requests = true;
    let session = SessionFactory::new(config).create();
    let intent = SendIntent::new("m", Message::user("Hi")).with_max_output_tokens(Some(10));
    let err = assert_err!(session.collect(intent).await);

    assert_eq!(err, ChatError::Api { status: 400, message: "Model not found".to_string() });
}

#[tokio::test]
async fn test_server_error_keeps_status_and_message() {
    let server = PaychatMockServer::new().await;
    server.mock_chat_error(500, "upstream exploded").await;

    let session = factory(&server).create();
    let intent = SendIntent::new("m", Message::user("Hi")).with_max_output_tokens(Some(10));
    let err = assert_err!(session.collect(intent).await);

    assert_eq!(err, ChatError::Api { status: 500, message: "upstream exploded".to_string() });
}

#[tokio::test]
async fn test_catalog_limits_and_cache() {
    let server = PaychatMockServer::new().await;
    server.mock_models(sample_models(), 1).await;

    let catalog = factory(&server).catalog();

    assert_eq!(assert_ok!(catalog.max_completion_tokens("openai/gpt-4o-mini").await), Some(16384));
    assert_eq!(assert_ok!(catalog.max_completion_tokens("meta/llama-3-70b").await), Some(2048));
    assert_eq!(assert_ok!(catalog.max_completion_tokens("unknown/model").await), None);
}

#[tokio::test]
async fn test_catalog_page_query() {
    let server = PaychatMockServer::new().await;
    server.mock_models(sample_models(), 1).await;

    let catalog = factory(&server).catalog();
    let page = assert_ok!(catalog.get_models(&ModelQuery::search("gpt")).await);

    let models = page.models.into_flat();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].display_name(), "GPT-4o mini");
    assert_eq!(page.pagination.map(|p| p.total_pages), Some(1));
}
