// ABOUTME: Database operations for recorded conversations and their messages
// ABOUTME: Ownership lookups, message appends with usage and cost, and history reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::{ConversationId, Credits, ModelId, UserId};
use crate::recorder::{ConversationStore, StoredMessage};

/// Database representation of a recorded message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    /// Message id
    pub id: i64,
    /// Conversation the message belongs to
    pub conversation_id: ConversationId,
    /// Model that produced the exchange
    pub model_id: Option<ModelId>,
    /// Role of the author (user, assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Units attributed to the message
    pub tokens_consumed: i64,
    /// Cost attributed to the message
    pub cost: Credits,
    /// When the message was written (RFC 3339)
    pub created_at: String,
}

/// Conversation store over `conversations` and `messages`
#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Create a store over a pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All messages of a conversation in write order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn messages(&self, conversation_id: ConversationId) -> AppResult<Vec<MessageRow>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, model_id, role, content, tokens_consumed, cost_micros, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| MessageRow {
                id: r.get("id"),
                conversation_id: r.get("conversation_id"),
                model_id: r.get("model_id"),
                role: r.get("role"),
                content: r.get("content"),
                tokens_consumed: r.get("tokens_consumed"),
                cost: Credits::from_micros(r.get("cost_micros")),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Model last used in a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn conversation_model(
        &self,
        conversation_id: ConversationId,
    ) -> AppResult<Option<ModelId>> {
        let model_id: Option<Option<ModelId>> =
            sqlx::query_scalar("SELECT model_id FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;
        Ok(model_id.flatten())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn owner_of(&self, conversation_id: ConversationId) -> AppResult<Option<UserId>> {
        sqlx::query_scalar("SELECT user_id FROM conversations WHERE id = $1 AND is_deleted = false")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get conversation owner: {e}")))
    }

    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
        message: &StoredMessage,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            INSERT INTO messages (conversation_id, model_id, role, content, tokens_consumed, cost_micros, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(conversation_id)
        .bind(model_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(i64::from(message.tokens_consumed))
        .bind(message.cost.micros())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        Ok(row.get("id"))
    }

    async fn touch_conversation(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE conversations
            SET model_id = $1, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(model_id)
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation: {e}")))?;
        Ok(())
    }
}
