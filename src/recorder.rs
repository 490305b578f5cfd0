// ABOUTME: Conversation recording of billed exchanges
// ABOUTME: Verifies ownership, then persists the user turn and the assistant turn with usage and cost
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, MessageRole};
use crate::models::{ConversationId, Credits, ModelId, TurnId, UsageRecord, UserId};

/// Message row written to a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Role of the author
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Units attributed to this message
    pub tokens_consumed: u32,
    /// Cost attributed to this message
    pub cost: Credits,
}

/// Conversation persistence
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Owner of a live conversation, `None` when it does not exist
    async fn owner_of(&self, conversation_id: ConversationId) -> AppResult<Option<UserId>>;

    /// Append one message, returning its id
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
        message: &StoredMessage,
    ) -> AppResult<i64>;

    /// Record the model last used and bump the conversation's update time
    async fn touch_conversation(
        &self,
        conversation_id: ConversationId,
        model_id: ModelId,
    ) -> AppResult<()>;
}

/// A finished exchange ready to be recorded
#[derive(Debug, Clone)]
pub struct NewTurn {
    /// Target conversation
    pub conversation_id: ConversationId,
    /// Requesting user
    pub user_id: UserId,
    /// Model that answered
    pub model_id: ModelId,
    /// Latest user message of the request, when there is one
    pub user_message: Option<ChatMessage>,
    /// Full assistant reply
    pub assistant_content: String,
    /// Billed usage
    pub usage: UsageRecord,
    /// Amount charged
    pub cost: Credits,
}

/// Appends billed turns to conversations the user owns
#[derive(Clone)]
pub struct ConversationRecorder {
    store: Arc<dyn ConversationStore>,
}

impl ConversationRecorder {
    /// Create a recorder over a store
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Fail unless `user_id` owns the conversation
    ///
    /// # Errors
    ///
    /// Returns `ConversationAccess` when the conversation is missing or owned
    /// by someone else.
    pub async fn verify_access(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> AppResult<()> {
        match self.store.owner_of(conversation_id).await? {
            Some(owner) if owner == user_id => Ok(()),
            _ => Err(AppError::conversation_access(conversation_id)),
        }
    }

    /// Persist a turn: the user message (0 units, no cost) then the assistant
    /// message carrying the total usage and the cost
    ///
    /// Returns the assistant message id. A failed second write is not retried
    /// and the first write is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns `ConversationAccess` when ownership fails (nothing is written),
    /// otherwise the store's error.
    pub async fn append(&self, turn: NewTurn) -> AppResult<TurnId> {
        self.verify_access(turn.conversation_id, turn.user_id)
            .await?;

        if let Some(user_message) = turn.user_message {
            self.store
                .insert_message(
                    turn.conversation_id,
                    turn.model_id,
                    &StoredMessage {
                        role: MessageRole::User,
                        content: user_message.content,
                        tokens_consumed: 0,
                        cost: Credits::ZERO,
                    },
                )
                .await?;
        }

        let turn_id = self
            .store
            .insert_message(
                turn.conversation_id,
                turn.model_id,
                &StoredMessage {
                    role: MessageRole::Assistant,
                    content: turn.assistant_content,
                    tokens_consumed: turn.usage.total_units,
                    cost: turn.cost,
                },
            )
            .await?;

        if let Err(e) = self
            .store
            .touch_conversation(turn.conversation_id, turn.model_id)
            .await
        {
            warn!(
                conversation_id = turn.conversation_id,
                "Failed to update conversation model: {e}"
            );
        }

        debug!(
            conversation_id = turn.conversation_id,
            turn_id,
            total_units = turn.usage.total_units,
            "Recorded conversation turn"
        );
        Ok(turn_id)
    }
}
