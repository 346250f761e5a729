mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use reqwest::Method;

use mp_mcp_client::{CallContext, Headers};
use support::{headers, http_pool, MockHttpServer, StubServer};

#[tokio::test]
async fn event_stream_responses_are_read() {
    let mock = MockHttpServer::new(StubServer::new());
    mock.stream_responses.store(true, Ordering::SeqCst);
    let pool = http_pool(mock.clone());
    let ctx = CallContext::background();

    let session = pool.get_session(&ctx, &Headers::new()).await.unwrap();
    assert_eq!(session.server_info().name, "stub");

    let result = session
        .call_tool(&ctx, "echo", serde_json::json!({ "text": "over sse" }))
        .await
        .unwrap();
    assert_eq!(result.content[0].text, "over sse");
    assert!(!result.is_error);
}

#[tokio::test]
async fn multibyte_text_survives_chunk_boundaries() {
    let mock = MockHttpServer::new(StubServer::new());
    mock.stream_responses.store(true, Ordering::SeqCst);
    // One byte per chunk splits every multi-byte character.
    *mock.chunk_size.lock() = Some(1);
    let pool = http_pool(mock.clone());
    let ctx = CallContext::background();

    let session = pool.get_session(&ctx, &Headers::new()).await.unwrap();
    let result = session
        .call_tool(&ctx, "echo", serde_json::json!({ "text": "café ☕ 日本" }))
        .await
        .unwrap();
    assert_eq!(result.content[0].text, "café ☕ 日本");
}

#[tokio::test]
async fn close_deletes_the_server_session() {
    let mock = MockHttpServer::new(StubServer::new());
    let pool = http_pool(mock.clone());
    let ctx = CallContext::background();

    pool.get_session(&ctx, &headers(&[("Authorization", "Bearer t")]))
        .await
        .unwrap();
    pool.close().await.unwrap();

    let deletes: Vec<_> = mock
        .seen()
        .into_iter()
        .filter(|r| r.method == Method::DELETE)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].session_id.as_deref(), Some("session-1"));
    assert_eq!(deletes[0].authorization.as_deref(), Some("Bearer t"));
}

#[tokio::test]
async fn delete_not_allowed_is_tolerated() {
    let mock = MockHttpServer::new(StubServer::new());
    *mock.delete_status.lock() = 405;
    let pool = http_pool(mock.clone());

    pool.get_session(&CallContext::background(), &Headers::new())
        .await
        .unwrap();
    pool.close().await.unwrap();
}

#[tokio::test]
async fn expired_server_session_is_recreated() {
    let server = StubServer::new();
    let mock = MockHttpServer::new(server.clone());
    let pool = http_pool(mock.clone());
    let ctx = CallContext::background();

    let first = pool.get_session(&ctx, &Headers::new()).await.unwrap();
    mock.expire("session-1");
    assert!(first.ping(&ctx).await.is_err());
    assert!(first.is_closed());

    let second = pool.get_session(&ctx, &Headers::new()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(server.initializations(), 2);
}

#[tokio::test]
async fn tool_errors_are_results_not_failures() {
    let pool = http_pool(MockHttpServer::new(StubServer::new()));
    let ctx = CallContext::background();
    let session = pool.get_session(&ctx, &Headers::new()).await.unwrap();

    let result = session
        .call_tool(&ctx, "missing", serde_json::json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
}
