// ABOUTME: HTTP-level tests for the chat completion, title, and health routes
// ABOUTME: Exercises the full router with middleware over a seeded database and scripted upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::Router;
use chat_relay::config::ServerConfig;
use chat_relay::errors::AppError;
use chat_relay::models::Credits;
use chat_relay::routes::{build_router, GenerateTitleResponse};
use common::{
    balance_of, create_test_database, create_test_resources, openai_delta, openai_finish,
    openai_response, openai_usage, ScriptedTransport, StreamScript, TestDatabase, ALICE, BOB,
    DEEPSEEK_MODEL_ID, DISABLED_MODEL_ID, OPENAI_DONE,
};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

const COMPLETIONS: &str = "/api/v1/chat/completions";
const TITLES: &str = "/api/v1/chat/titles";

async fn setup(balance: Credits) -> (TestDatabase, Arc<ScriptedTransport>, Router) {
    let db = create_test_database(balance).await;
    let transport = ScriptedTransport::new();
    let router = build_router(
        create_test_resources(&db.database, transport.clone()),
        &ServerConfig::default(),
    );
    (db, transport, router)
}

fn completion_body(conversation_id: i64, model_id: i64, stream: bool) -> Value {
    json!({
        "modelId": model_id,
        "conversationId": conversation_id,
        "stream": stream,
        "messages": [{"role": "user", "content": "Say hello"}]
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_db, _transport, router) = setup(Credits::ZERO).await;

    let response = AxumTestRequest::get("/health").send(router).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "chat-relay-server");
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let (_db, _transport, router) = setup(Credits::ZERO).await;

    let generated = AxumTestRequest::get("/health").send(router.clone()).await;
    assert!(generated.header("x-request-id").is_some());

    let echoed = AxumTestRequest::get("/health")
        .header("x-request-id", "req-123")
        .send(router)
        .await;
    assert_eq!(echoed.header("x-request-id").as_deref(), Some("req-123"));
}

#[tokio::test]
async fn test_sync_completion_returns_json_and_bills() {
    let (db, transport, router) = setup(Credits::from_micros(1_000_000)).await;
    transport.push_json(openai_response("Hello there", 5, 7));

    let response = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, false))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello there");
    assert_eq!(body["choices"][0]["finishReason"], "stop");
    assert_eq!(body["usage"]["totalTokens"], 12);
    assert_eq!(
        balance_of(&db.database, ALICE).await,
        Credits::from_micros(1_000_000 - 168)
    );
}

#[tokio::test]
async fn test_stream_completion_frames_chunks_and_done() {
    let (db, transport, router) = setup(Credits::from_micros(1_000_000)).await;
    let tail = format!("{}{}{OPENAI_DONE}", openai_finish("stop"), openai_usage(20, 30));
    transport.push_stream(StreamScript::reads(&[
        &openai_delta("Hel"),
        &openai_delta("lo"),
        &tail,
    ]));

    let response = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, true))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));

    let frames = response.sse_frames();
    let (last_event, last_data) = frames.last().unwrap();
    assert!(last_event.is_none());
    assert_eq!(last_data, "[DONE]");

    let content: String = frames[..frames.len() - 1]
        .iter()
        .filter_map(|(_, data)| serde_json::from_str::<Value>(data).ok())
        .filter_map(|chunk| chunk["deltaContent"].as_str().map(ToOwned::to_owned))
        .collect();
    assert_eq!(content, "Hello");

    // Billing and recording finish before [DONE] is sent
    let recorded = db
        .database
        .conversation_store()
        .messages(db.conversation_id)
        .await
        .unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].content, "Hello");
    assert_eq!(recorded[1].tokens_consumed, 50);
    // ceil(14000 * 50 / 1000) = 700
    assert_eq!(recorded[1].cost, Credits::from_micros(700));
}

#[tokio::test]
async fn test_stream_failure_emits_error_event() {
    let (db, transport, router) = setup(Credits::from_micros(1_000_000)).await;
    transport.push_stream(StreamScript::Reads(vec![
        Ok(openai_delta("Partial").into()),
        Err(AppError::upstream_transport("deepseek", "connection reset")),
    ]));

    let response = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, true))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let frames = response.sse_frames();
    let (event, data) = frames.last().unwrap();
    assert_eq!(event.as_deref(), Some("error"));
    let error: Value = serde_json::from_str(data).unwrap();
    assert_eq!(error["error"]["code"], "UPSTREAM_TRANSPORT_ERROR");
    assert!(!frames.iter().any(|(_, data)| data == "[DONE]"));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (db, transport, router) = setup(Credits::from_micros(1_000_000)).await;

    let response = AxumTestRequest::post(COMPLETIONS)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, false))
        .send(router)
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_bodies_are_bad_requests() {
    let (db, _transport, router) = setup(Credits::from_micros(1_000_000)).await;

    let malformed = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .raw_json("{not json")
        .send(router.clone())
        .await;
    assert_eq!(malformed.status(), 400);
    let body: Value = malformed.json();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let empty_messages = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&json!({
            "modelId": DEEPSEEK_MODEL_ID,
            "conversationId": db.conversation_id,
            "messages": []
        }))
        .send(router.clone())
        .await;
    assert_eq!(empty_messages.status(), 400);

    let blank_content = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&json!({
            "modelId": DEEPSEEK_MODEL_ID,
            "conversationId": db.conversation_id,
            "messages": [{"role": "user", "content": "   "}]
        }))
        .send(router)
        .await;
    assert_eq!(blank_content.status(), 400);
}

#[tokio::test]
async fn test_pre_check_failures_are_json_errors_even_when_streaming() {
    let (db, transport, router) = setup(Credits::from_micros(10)).await;

    let insufficient = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, true))
        .send(router.clone())
        .await;
    assert_eq!(insufficient.status(), 402);
    assert!(insufficient
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));
    let body: Value = insufficient.json();
    assert_eq!(body["error"]["code"], "INSUFFICIENT_CREDIT");

    let foreign = AxumTestRequest::post(COMPLETIONS)
        .user(BOB)
        .json(&completion_body(db.conversation_id, DEEPSEEK_MODEL_ID, true))
        .send(router.clone())
        .await;
    assert_eq!(foreign.status(), 403);

    let missing = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, 999, false))
        .send(router.clone())
        .await;
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json();
    assert_eq!(body["error"]["code"], "MODEL_NOT_FOUND");

    let disabled = AxumTestRequest::post(COMPLETIONS)
        .user(ALICE)
        .json(&completion_body(db.conversation_id, DISABLED_MODEL_ID, false))
        .send(router)
        .await;
    assert_eq!(disabled.status(), 400);
    let body: Value = disabled.json();
    assert_eq!(body["error"]["code"], "MODEL_DISABLED");

    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_generate_title_cleans_model_output() {
    let (db, transport, router) = setup(Credits::ZERO).await;
    transport.push_json(openai_response("\"Title: Rust ownership basics\"", 20, 5));

    let response = AxumTestRequest::post(TITLES)
        .user(ALICE)
        .json(&json!({
            "conversationId": db.conversation_id,
            "messages": [
                {"role": "user", "content": "How does ownership work in Rust?"},
                {"role": "assistant", "content": "Each value has a single owner."}
            ]
        }))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let body: GenerateTitleResponse = response.json();
    assert_eq!(body.title, "Rust ownership basics");
    assert_eq!(body.conversation_id, db.conversation_id);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].endpoint.ends_with("/chat/completions"));
    assert_eq!(requests[0].credential, "title-key");
}

#[tokio::test]
async fn test_generate_title_falls_back_when_upstream_fails() {
    let (db, transport, router) = setup(Credits::ZERO).await;
    transport.push_json_error(AppError::upstream_timeout("titles", "timed out after 30s"));

    let response = AxumTestRequest::post(TITLES)
        .user(ALICE)
        .json(&json!({
            "conversationId": db.conversation_id,
            "summary": true,
            "messages": [{"role": "user", "content": "Plan my week"}]
        }))
        .send(router)
        .await;

    assert_eq!(response.status(), 200);
    let body: GenerateTitleResponse = response.json();
    assert_eq!(body.title, "Conversation summary");
}

#[tokio::test]
async fn test_generate_title_rejects_empty_messages() {
    let (db, _transport, router) = setup(Credits::ZERO).await;

    let response = AxumTestRequest::post(TITLES)
        .user(ALICE)
        .json(&json!({"conversationId": db.conversation_id, "messages": []}))
        .send(router)
        .await;

    assert_eq!(response.status(), 400);
}
