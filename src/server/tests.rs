use std::time::Duration;

use axum::body::to_bytes;
use axum::http::header;
use futures::StreamExt;
use tokio::time::Instant;

use super::stream::{
    CONTENT_TYPE, DATA_STREAM_HEADER, encode_data_stream, error_part, finish_part, text_part,
};
use super::*;
use crate::completion::{CompletionEvent, FinishReason, TokenStream};

fn text(token: &str) -> crate::Result<CompletionEvent> {
    Ok(CompletionEvent::Text(token.to_string()))
}

fn tokens(items: Vec<crate::Result<CompletionEvent>>) -> TokenStream {
    Box::pin(futures::stream::iter(items))
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

async fn collect_parts(stream: TokenStream, deadline: Instant) -> Vec<String> {
    encode_data_stream(stream, deadline).collect().await
}

#[test]
fn parts_are_json_encoded_lines() {
    assert_eq!(text_part("Lewis"), "0:\"Lewis\"\n");
    assert_eq!(text_part("say \"hi\"\n"), "0:\"say \\\"hi\\\"\\n\"\n");
    assert_eq!(error_part("Internal Server Error"), "3:\"Internal Server Error\"\n");
    assert_eq!(finish_part(FinishReason::Stop), "d:{\"finishReason\":\"stop\"}\n");
    assert_eq!(finish_part(FinishReason::Error), "d:{\"finishReason\":\"error\"}\n");
    assert_eq!(finish_part(FinishReason::Length), "d:{\"finishReason\":\"length\"}\n");
}

#[tokio::test]
async fn tokens_then_stop() {
    let parts = collect_parts(
        tokens(vec![text("Lewis"), text(" Hamilton")]),
        far_deadline(),
    )
    .await;

    assert_eq!(
        parts,
        vec![
            "0:\"Lewis\"\n".to_string(),
            "0:\" Hamilton\"\n".to_string(),
            "d:{\"finishReason\":\"stop\"}\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn reported_finish_reason_reaches_the_finish_part() {
    let parts = collect_parts(
        tokens(vec![
            text("Hamilton led every lap until"),
            Ok(CompletionEvent::Finished(FinishReason::Length)),
        ]),
        far_deadline(),
    )
    .await;

    assert_eq!(
        parts,
        vec![
            "0:\"Hamilton led every lap until\"\n".to_string(),
            "d:{\"finishReason\":\"length\"}\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn truncated_completion_body_ends_with_length() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
        vec![Ok(body.as_bytes().to_vec())];
    let events = crate::completion::openai::sse_tokens(futures::stream::iter(chunks));

    let parts = collect_parts(events, far_deadline()).await;

    assert_eq!(
        parts,
        vec![
            "0:\"Hi\"\n".to_string(),
            "d:{\"finishReason\":\"length\"}\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn empty_tokens_are_skipped() {
    let parts = collect_parts(
        tokens(vec![text(""), text("a"), text("")]),
        far_deadline(),
    )
    .await;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], "0:\"a\"\n");
}

#[tokio::test]
async fn stream_error_becomes_generic_error_part() {
    let parts = collect_parts(
        tokens(vec![
            text("partial"),
            Err(RagError::Completion("upstream reset with secret detail".to_string())),
            text("never sent"),
        ]),
        far_deadline(),
    )
    .await;

    assert_eq!(
        parts,
        vec![
            "0:\"partial\"\n".to_string(),
            "3:\"Internal Server Error\"\n".to_string(),
            "d:{\"finishReason\":\"error\"}\n".to_string(),
        ]
    );
    assert!(!parts.concat().contains("secret detail"));
}

#[tokio::test]
async fn deadline_ends_a_stalled_stream() {
    let stalled: TokenStream = Box::pin(
        futures::stream::iter(vec![text("first")]).chain(futures::stream::pending()),
    );
    let deadline = Instant::now() + Duration::from_millis(50);

    let parts = collect_parts(stalled, deadline).await;

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "0:\"first\"\n");
    assert_eq!(parts[1], "3:\"Internal Server Error\"\n");
    assert_eq!(parts[2], "d:{\"finishReason\":\"error\"}\n");
}

#[tokio::test]
async fn response_carries_protocol_headers() {
    let response = data_stream_response(tokens(vec![text("hi")]), far_deadline());

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some(CONTENT_TYPE)
    );
    assert_eq!(
        response.headers().get(DATA_STREAM_HEADER).and_then(|v| v.to_str().ok()),
        Some("v1")
    );

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    assert_eq!(
        String::from_utf8_lossy(&body),
        "0:\"hi\"\nd:{\"finishReason\":\"stop\"}\n"
    );
}

async fn error_response(error: ChatError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    let json = serde_json::from_slice(&body).expect("error body is JSON");
    (status, json)
}

#[tokio::test]
async fn chat_errors_map_to_status_and_message() {
    let (status, body) = error_response(ChatError::InvalidQuestion).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid question" }));

    let (status, body) = error_response(ChatError::EmbeddingUnavailable).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to generate embedding" }));

    let (status, body) = error_response(ChatError::Internal(RagError::VectorStore(
        "COLLECTION_NOT_EXIST: f1gpt".to_string(),
    )))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal Server Error" }));
}

#[test]
fn index_page_posts_to_chat_route() {
    assert!(INDEX_HTML.contains("/api/chat"));
}

#[test]
fn index_page_keeps_errors_out_of_the_conversation() {
    assert!(INDEX_HTML.contains(r#"<p id="error" role="alert" hidden></p>"#));
    // error parts and failed responses land in the error box, never in a reply
    assert!(INDEX_HTML.contains("reply.failed = payload;"));
    assert!(INDEX_HTML.contains("reply.failed = body.error"));
    assert!(!INDEX_HTML.contains("reply.content = body.error"));
    assert!(INDEX_HTML.contains("messages.push({ role: \"assistant\", content: reply.content })"));
}
