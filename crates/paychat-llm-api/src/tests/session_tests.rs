use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use paychat_types::{Message, Role, StreamEvent, DEFAULT_MAX_OUTPUT_TOKENS};

use crate::auth::StaticCredential;
use crate::budget::HistoryBudgeter;
use crate::catalog::{MockModelCatalog, ModelCatalog, StaticCatalog};
use crate::client::{ScriptedResponse, ScriptedTransport};
use crate::error::ChatError;
use crate::session::{SendIntent, StreamSession};

const HELLO_STREAM: [&str; 3] = [
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\nda",
    "ta: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
    "data: {\"newChats\":{\"userChat\":{\"chatId\":\"u1\"},\"assistantChat\":{\"chatId\":\"a1\"}}}\ndata: [DONE]\n",
];

fn session(transport: Arc<ScriptedTransport>, catalog: Arc<dyn ModelCatalog>) -> StreamSession {
    StreamSession::new(transport, catalog, Arc::new(StaticCredential::new("tok-123")))
}

fn request_json(transport: &ScriptedTransport, index: usize) -> serde_json::Value {
    serde_json::from_str(&transport.requests()[index].body).unwrap()
}

#[tokio::test]
async fn test_full_session_over_scripted_transport() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(StaticCatalog::new()));

    let intent = SendIntent::new("m", Message::user("Hi"))
        .with_conversation(Some("c1".to_string()))
        .with_max_output_tokens(Some(100));
    let events = session.collect(intent).await.unwrap();

    assert_eq!(events[0], StreamEvent::ContentDelta("Hel".to_string()));
    assert_eq!(events[1], StreamEvent::ContentDelta("lo".to_string()));
    assert!(matches!(events[2], StreamEvent::NewIds(_)));
    assert_eq!(
        events[3],
        StreamEvent::AssistantReply(Message::new("a1", Role::Assistant, "Hello"))
    );
    assert_eq!(events[4], StreamEvent::StreamEnd);
    assert_eq!(events.len(), 5);

    let sent = &transport.requests()[0];
    assert_eq!(sent.bearer.as_deref(), Some("tok-123"));
    assert_eq!(sent.model, "m");
    let body = request_json(&transport, 0);
    assert_eq!(body["conversationId"], "c1");
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(body["messages"][0]["content"], "Hi");
    assert_eq!(body["chatHistory"], serde_json::json!([]));
}

#[tokio::test]
async fn test_reply_without_server_ids_gets_placeholder() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text([
        "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
    ])));
    let session = session(transport, Arc::new(StaticCatalog::new()));

    let events = session.collect(SendIntent::new("m", Message::user("q"))).await.unwrap();

    match &events[1] {
        StreamEvent::AssistantReply(reply) => {
            assert!(reply.has_placeholder_id());
            assert_eq!(reply.content, "ok");
        }
        other => panic!("expected assistant reply, got {:?}", other),
    }
}

#[tokio::test]
async fn test_explicit_max_tokens_skips_catalog() {
    let mut catalog = MockModelCatalog::new();
    catalog.expect_max_completion_tokens().never();

    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(catalog));

    let intent = SendIntent::new("m", Message::user("Hi")).with_max_output_tokens(Some(256));
    session.collect(intent).await.unwrap();

    assert_eq!(request_json(&transport, 0)["max_tokens"], 256);
}

#[tokio::test]
async fn test_max_tokens_from_catalog() {
    let mut catalog = MockModelCatalog::new();
    catalog
        .expect_max_completion_tokens()
        .times(1)
        .returning(|_| Ok(Some(8192)));

    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(catalog));
    session.collect(SendIntent::new("m", Message::user("Hi"))).await.unwrap();

    assert_eq!(request_json(&transport, 0)["max_tokens"], 8192);
}

#[tokio::test]
async fn test_max_tokens_default_when_catalog_fails() {
    let mut catalog = MockModelCatalog::new();
    catalog
        .expect_max_completion_tokens()
        .returning(|_| Err(ChatError::Transport("offline".to_string())));

    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(catalog));
    session.collect(SendIntent::new("m", Message::user("Hi"))).await.unwrap();

    assert_eq!(request_json(&transport, 0)["max_tokens"], DEFAULT_MAX_OUTPUT_TOKENS);
}

#[tokio::test]
async fn test_rejected_request_ends_with_single_error() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::Reject(
        ChatError::InsufficientBalance("Insufficient balance".to_string()),
    )));
    let session = session(transport, Arc::new(StaticCatalog::new()));

    let items: Vec<_> = session.begin(SendIntent::new("m", Message::user("Hi"))).collect().await;

    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_insufficient_balance());
}

#[tokio::test]
async fn test_stream_cut_short_has_no_stream_end() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::Chunks(vec![
        Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n".to_vec()),
        Err(ChatError::Transport("connection reset".to_string())),
    ])));
    let session = session(transport, Arc::new(StaticCatalog::new()));

    let items: Vec<_> = session.begin(SendIntent::new("m", Message::user("Hi"))).collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok(StreamEvent::ContentDelta("par".to_string())));
    assert_eq!(items[1], Err(ChatError::Transport("connection reset".to_string())));
}

#[tokio::test]
async fn test_oversized_history_is_trimmed_and_notice_comes_first() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(StaticCatalog::new()))
        .with_budgeter(HistoryBudgeter::new(2_000, 100));

    let history: Vec<Message> = (0..10)
        .map(|i| Message::new(format!("h{}", i), Role::User, "x".repeat(300)))
        .collect();
    let intent = SendIntent::new("m", Message::user("Hi"))
        .with_history(history.clone())
        .with_max_output_tokens(Some(10));

    let events = session.collect(intent).await.unwrap();

    let notice = match &events[0] {
        StreamEvent::OptimizationNotice(notice) => *notice,
        other => panic!("expected optimization notice first, got {:?}", other),
    };
    assert_eq!(notice.original_count, 10);
    assert!(notice.kept_count > 0 && notice.kept_count < 10);

    let body = request_json(&transport, 0);
    let sent = body["chatHistory"].as_array().unwrap();
    assert_eq!(sent.len(), notice.kept_count);
    assert_eq!(sent.last().unwrap()["chatId"], "h9");
    assert!(transport.requests()[0].body.len() <= 2_000);
}

#[tokio::test]
async fn test_base_payload_over_limit_never_opens_transport() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(StaticCatalog::new()))
        .with_budgeter(HistoryBudgeter::new(1_000, 100));

    let intent = SendIntent::new("m", Message::user("y".repeat(5_000)))
        .with_history(vec![Message::assistant("earlier")])
        .with_max_output_tokens(Some(10));
    let err = session.collect(intent).await.unwrap_err();

    assert!(matches!(err, ChatError::BaseRequestTooLarge { .. }));
    assert!(err.is_size_error());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_small_request_is_sent_untouched() {
    let transport = Arc::new(ScriptedTransport::new().with_response(ScriptedResponse::text(HELLO_STREAM)));
    let session = session(transport.clone(), Arc::new(StaticCatalog::new()));

    let history = vec![Message::new("u0", Role::User, "a"), Message::new("a0", Role::Assistant, "b")];
    let intent = SendIntent::new("m", Message::user("Hi"))
        .with_history(history)
        .with_max_output_tokens(Some(10));
    let events = session.collect(intent).await.unwrap();

    assert!(!events.iter().any(|e| matches!(e, StreamEvent::OptimizationNotice(_))));
    assert_eq!(request_json(&transport, 0)["chatHistory"].as_array().unwrap().len(), 2);
}
