// ABOUTME: Chat orchestration for synchronous and streaming turns
// ABOUTME: Resolve model, pre-check credit, verify ownership, call upstream, then bill and record
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Orchestrator
//!
//! Entry point for one conversation turn. Every pre-check happens before the
//! provider is contacted, so a rejected request never costs anything and
//! never opens a stream:
//!
//! 1. resolve the model (`ModelNotFound` / `ModelDisabled`)
//! 2. check the balance covers a minimum viable exchange (`InsufficientCredit`)
//! 3. check the conversation belongs to the caller (`ConversationAccess`)
//!
//! The synchronous path aborts without billing on any upstream failure. The
//! streaming path hands the exchange to a [`StreamRelay`] task and returns
//! its handle at once.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::credit::CreditGuard;
use crate::errors::AppResult;
use crate::finalize::{ExchangeContext, ExchangeFinalizer};
use crate::llm::{
    ChatMessage, ChatTurnRequest, ChatTurnResponse, CompletionChoice, ProtocolAdapter,
    UpstreamRequest, UpstreamTransport,
};
use crate::models::UserId;
use crate::recorder::ConversationRecorder;
use crate::relay::{RelayHandle, StreamRelay};
use crate::resolver::ModelResolver;

/// Prepared exchange, after every pre-check passed
struct PreparedExchange {
    adapter: ProtocolAdapter,
    context: ExchangeContext,
    request: UpstreamRequest,
}

/// Coordinates resolution, metering, relay, and recording for one turn
#[derive(Clone)]
pub struct ChatOrchestrator {
    resolver: ModelResolver,
    credit: CreditGuard,
    recorder: ConversationRecorder,
    finalizer: ExchangeFinalizer,
    transport: Arc<dyn UpstreamTransport>,
    relay: StreamRelay,
}

impl ChatOrchestrator {
    /// Wire an orchestrator from its collaborators
    #[must_use]
    pub fn new(
        resolver: ModelResolver,
        credit: CreditGuard,
        recorder: ConversationRecorder,
        transport: Arc<dyn UpstreamTransport>,
        relay_config: RelayConfig,
    ) -> Self {
        let finalizer = ExchangeFinalizer::new(credit.clone(), recorder.clone());
        let relay = StreamRelay::new(Arc::clone(&transport), finalizer.clone(), relay_config);
        Self {
            resolver,
            credit,
            recorder,
            finalizer,
            transport,
            relay,
        }
    }

    async fn prepare(
        &self,
        request: ChatTurnRequest,
        user_id: UserId,
        stream: bool,
    ) -> AppResult<PreparedExchange> {
        let model = self.resolver.resolve(request.model_id).await?;
        let adapter = self.resolver.adapter_for(&model);

        self.credit.pre_check(user_id, &model).await?;
        self.recorder
            .verify_access(request.conversation_id, user_id)
            .await?;

        let body = adapter.build_request(&model, &request, stream);
        let upstream = UpstreamRequest::for_model(&model, body);

        Ok(PreparedExchange {
            adapter,
            context: ExchangeContext {
                user_id,
                conversation_id: request.conversation_id,
                model,
                messages: request.messages,
            },
            request: upstream,
        })
    }

    /// Run a synchronous turn
    ///
    /// # Errors
    ///
    /// Returns the pre-check error, or the upstream/parse error. In every error
    /// case nothing is debited or recorded.
    #[instrument(
        skip(self, request),
        fields(model_id = request.model_id, conversation_id = request.conversation_id)
    )]
    pub async fn chat(
        &self,
        request: ChatTurnRequest,
        user_id: UserId,
    ) -> AppResult<ChatTurnResponse> {
        let prepared = self.prepare(request, user_id, false).await?;

        let body = self.transport.send_json(prepared.request).await?;
        let payload = prepared.adapter.parse_response(&body)?;

        let outcome = self
            .finalizer
            .finalize(&prepared.context, &payload.content, payload.usage)
            .await;
        info!(
            user_id,
            total_units = outcome.usage.total_units,
            cost = %outcome.cost,
            "Completed synchronous turn"
        );

        Ok(ChatTurnResponse {
            id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
            object: "chat.completion".to_owned(),
            created: Utc::now().timestamp(),
            model: payload
                .model
                .unwrap_or_else(|| prepared.context.model.model_name.clone()),
            choices: vec![CompletionChoice {
                index: 0,
                message: ChatMessage::assistant(payload.content),
                finish_reason: payload.finish_reason,
            }],
            usage: outcome.usage,
        })
    }

    /// Start a streaming turn, returning the relay handle without waiting for completion
    ///
    /// # Errors
    ///
    /// Returns the pre-check error; upstream failures arrive through the handle.
    #[instrument(
        skip(self, request),
        fields(model_id = request.model_id, conversation_id = request.conversation_id)
    )]
    pub async fn chat_stream(
        &self,
        request: ChatTurnRequest,
        user_id: UserId,
    ) -> AppResult<RelayHandle> {
        let prepared = self.prepare(request, user_id, true).await?;
        Ok(self
            .relay
            .start(prepared.adapter, prepared.context, prepared.request))
    }
}
