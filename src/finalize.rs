// ABOUTME: Exchange finalization shared by the synchronous and streaming paths
// ABOUTME: Resolves final usage, debits credit, and records the turn with the charged cost
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tracing::{error, info, warn};

use crate::credit::CreditGuard;
use crate::llm::{last_user_message, ChatMessage, UsageEstimator};
use crate::models::{ConversationId, Credits, ModelConfig, TurnId, UsageRecord, UserId};
use crate::recorder::{ConversationRecorder, NewTurn};

/// Immutable context of one exchange
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    /// Requesting user
    pub user_id: UserId,
    /// Target conversation
    pub conversation_id: ConversationId,
    /// Resolved model
    pub model: ModelConfig,
    /// Prompt messages as sent upstream
    pub messages: Vec<ChatMessage>,
}

/// What finalization did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Usage that was billed
    pub usage: UsageRecord,
    /// Whether usage was estimated locally
    pub usage_estimated: bool,
    /// Amount charged (zero when the debit failed)
    pub cost: Credits,
    /// Persisted assistant message id
    pub turn_id: Option<TurnId>,
}

/// Runs the bill-then-record sequence of a finished exchange
#[derive(Clone)]
pub struct ExchangeFinalizer {
    credit: CreditGuard,
    recorder: ConversationRecorder,
}

impl ExchangeFinalizer {
    /// Create a finalizer
    #[must_use]
    pub fn new(credit: CreditGuard, recorder: ConversationRecorder) -> Self {
        Self { credit, recorder }
    }

    /// Usage to bill: the provider's report, else an estimate from the text
    #[must_use]
    pub fn resolve_usage(
        context: &ExchangeContext,
        content: &str,
        reported: Option<UsageRecord>,
    ) -> (UsageRecord, bool) {
        match reported {
            Some(usage) if usage.total_units > 0 => (usage, false),
            _ => (UsageEstimator::estimate(&context.messages, content), true),
        }
    }

    /// Bill and record a finished exchange
    ///
    /// A failed debit still records the turn, with zero cost. A failed write is
    /// logged; the client has already received the answer.
    pub async fn finalize(
        &self,
        context: &ExchangeContext,
        content: &str,
        reported: Option<UsageRecord>,
    ) -> FinalizeOutcome {
        let (usage, usage_estimated) = Self::resolve_usage(context, content, reported);
        if usage_estimated {
            info!(
                model_id = context.model.id,
                total_units = usage.total_units,
                "Provider reported no usage, billing estimate"
            );
        }

        let cost = match self
            .credit
            .debit(context.user_id, &usage, &context.model)
            .await
        {
            Ok(cost) => cost,
            Err(e) => {
                warn!(
                    user_id = context.user_id,
                    conversation_id = context.conversation_id,
                    "Debit failed, recording turn with zero cost: {e}"
                );
                Credits::ZERO
            }
        };

        let user_message = last_user_message(&context.messages).cloned();

        let turn_id = match self
            .recorder
            .append(NewTurn {
                conversation_id: context.conversation_id,
                user_id: context.user_id,
                model_id: context.model.id,
                user_message,
                assistant_content: content.to_owned(),
                usage,
                cost,
            })
            .await
        {
            Ok(turn_id) => Some(turn_id),
            Err(e) => {
                error!(
                    user_id = context.user_id,
                    conversation_id = context.conversation_id,
                    %cost,
                    "Failed to record conversation turn: {e}"
                );
                None
            }
        };

        FinalizeOutcome {
            usage,
            usage_estimated,
            cost,
            turn_id,
        }
    }
}
