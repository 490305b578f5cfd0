// ABOUTME: Integration tests for conversation recording
// ABOUTME: Ownership enforcement, write order, and surfaced second-write failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chat_relay::database::SqliteConversationStore;
use chat_relay::errors::{AppError, AppResult, ErrorCode};
use chat_relay::llm::{ChatMessage, MessageRole};
use chat_relay::models::{ConversationId, Credits, ModelId, UsageRecord, UserId};
use chat_relay::recorder::{ConversationRecorder, ConversationStore, NewTurn, StoredMessage};
use common::{create_test_database, ALICE, BOB, DEEPSEEK_MODEL_ID};

fn new_turn(conversation_id: ConversationId, user_id: UserId) -> NewTurn {
    NewTurn {
        conversation_id,
        user_id,
        model_id: DEEPSEEK_MODEL_ID,
        user_message: Some(ChatMessage::user("Question")),
        assistant_content: "Answer".to_owned(),
        usage: UsageRecord::new(30, 12),
        cost: Credits::from_micros(588),
    }
}

/// Store that fails every assistant write
struct FailingAssistantStore {
    inner: SqliteConversationStore,
}

#[async_trait]
impl ConversationStore for FailingAssistantStore {
    async fn owner_of(&self, conversation_id: ConversationId) -> AppResult<Option<UserId>> {
        self.inner.owner_of(conversation_id).await
    }

    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
        message: &StoredMessage,
    ) -> AppResult<i64> {
        if message.role == MessageRole::Assistant {
            return Err(AppError::database("disk full"));
        }
        self.inner
            .insert_message(conversation_id, model_id, message)
            .await
    }

    async fn touch_conversation(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
    ) -> AppResult<()> {
        self.inner.touch_conversation(conversation_id, model_id).await
    }
}

#[tokio::test]
async fn test_append_writes_user_then_assistant() {
    let db = create_test_database(Credits::ZERO).await;
    let store = db.database.conversation_store();
    let recorder = ConversationRecorder::new(Arc::new(store.clone()));

    let turn_id = recorder
        .append(new_turn(db.conversation_id, ALICE))
        .await
        .unwrap();

    let messages = store.messages(db.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "Question");
    assert_eq!(messages[0].tokens_consumed, 0);
    assert_eq!(messages[1].id, turn_id);
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].tokens_consumed, 42);
    assert_eq!(messages[1].cost, Credits::from_micros(588));
    assert_eq!(messages[1].model_id, Some(DEEPSEEK_MODEL_ID));
}

#[tokio::test]
async fn test_append_rejects_foreign_and_missing_conversations() {
    let db = create_test_database(Credits::ZERO).await;
    let store = db.database.conversation_store();
    let recorder = ConversationRecorder::new(Arc::new(store.clone()));

    let foreign = recorder
        .append(new_turn(db.conversation_id, BOB))
        .await
        .unwrap_err();
    assert_eq!(foreign.code, ErrorCode::ConversationAccess);

    let missing = recorder.append(new_turn(9_999, ALICE)).await.unwrap_err();
    assert_eq!(missing.code, ErrorCode::ConversationAccess);

    assert!(store.messages(db.conversation_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_conversation_is_not_accessible() {
    let db = create_test_database(Credits::ZERO).await;
    let recorder = ConversationRecorder::new(Arc::new(db.database.conversation_store()));

    assert!(db.database.delete_conversation(db.conversation_id).await.unwrap());

    let error = recorder
        .verify_access(db.conversation_id, ALICE)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ConversationAccess);
}

#[tokio::test]
async fn test_second_write_failure_is_surfaced_without_rollback() {
    let db = create_test_database(Credits::ZERO).await;
    let store = db.database.conversation_store();
    let recorder = ConversationRecorder::new(Arc::new(FailingAssistantStore {
        inner: store.clone(),
    }));

    let error = recorder
        .append(new_turn(db.conversation_id, ALICE))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::DatabaseError);

    let messages = store.messages(db.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "user");
}

#[tokio::test]
async fn test_turn_without_user_message_records_assistant_only() {
    let db = create_test_database(Credits::ZERO).await;
    let store = db.database.conversation_store();
    let recorder = ConversationRecorder::new(Arc::new(store.clone()));

    let mut turn = new_turn(db.conversation_id, ALICE);
    turn.user_message = None;
    recorder.append(turn).await.unwrap();

    let messages = store.messages(db.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "assistant");
}
