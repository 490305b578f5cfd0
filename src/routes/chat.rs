// ABOUTME: Chat route handlers for unified completions and conversation titles
// ABOUTME: Serves synchronous JSON turns, SSE-streamed turns, and title generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! `POST /api/v1/chat/completions` runs one conversation turn. With
//! `stream: true` the response is an SSE stream of normalized chunks
//! terminated by `data: [DONE]`; a failure after the stream opened closes it
//! with an `event: error` frame. Every pre-check failure is returned before
//! the stream opens, as a regular JSON error.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{relay::DONE_SENTINEL, routes};
use crate::errors::{AppError, AppResult, ErrorResponse};
use crate::llm::{ChatCompletionRequest, ChatMessage};
use crate::models::ConversationId;
use crate::relay::{RelayEvent, RelayHandle};
use crate::resources::ServerResources;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to generate a conversation title
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTitleRequest {
    /// Conversation the title is for
    pub conversation_id: ConversationId,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Custom instruction replacing the default one
    #[serde(default)]
    pub prompt: Option<String>,
    /// Summarize the whole conversation instead of its opening
    #[serde(default)]
    pub summary: bool,
}

/// Generated title
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTitleResponse {
    /// Cleaned title
    pub title: String,
    /// Conversation the title is for
    pub conversation_id: ConversationId,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::CHAT_COMPLETIONS, post(Self::chat_completions))
            .route(routes::CHAT_TITLES, post(Self::generate_title))
            .with_state(resources)
    }

    fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
        payload
            .map(|Json(body)| body)
            .map_err(|rejection| AppError::invalid_input(rejection.body_text()))
    }

    /// Run one chat turn, streamed or not
    async fn chat_completions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let user_id = resources.identity.user_id(&headers)?;
        let request = Self::body(payload)?.validate()?;

        if request.stream {
            let handle = resources.orchestrator.chat_stream(request, user_id).await?;
            Ok(Self::sse_response(handle).into_response())
        } else {
            let response = resources.orchestrator.chat(request, user_id).await?;
            Ok(Json(response).into_response())
        }
    }

    /// Generate a title; falls back to a default title instead of failing
    async fn generate_title(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        payload: Result<Json<GenerateTitleRequest>, JsonRejection>,
    ) -> Result<Json<GenerateTitleResponse>, AppError> {
        let user_id = resources.identity.user_id(&headers)?;
        let request = Self::body(payload)?;
        if request.messages.is_empty() {
            return Err(AppError::invalid_input("messages must not be empty"));
        }

        let title = if request.summary {
            resources.titles.generate_summary(&request.messages).await
        } else {
            resources
                .titles
                .generate(&request.messages, request.prompt.as_deref())
                .await
        };
        info!(user_id, conversation_id = request.conversation_id, "Title generated");

        Ok(Json(GenerateTitleResponse {
            title,
            conversation_id: request.conversation_id,
        }))
    }

    /// Frame relay events as SSE
    ///
    /// Dropping the returned stream (client disconnect) drops the event
    /// receiver, which the relay observes as a cancellation.
    fn sse_response(handle: RelayHandle) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let mut events = handle.events;

        let stream = async_stream::stream! {
            while let Some(event) = events.recv().await {
                match event {
                    RelayEvent::Chunk(chunk) => match serde_json::to_string(&chunk) {
                        Ok(data) => yield Ok(Event::default().data(data)),
                        Err(e) => warn!("Failed to serialize chunk: {e}"),
                    },
                    RelayEvent::Done => {
                        yield Ok(Event::default().data(DONE_SENTINEL));
                        break;
                    }
                    RelayEvent::Failed(error) => {
                        let body = serde_json::to_string(&ErrorResponse::from(&error))
                            .unwrap_or_else(|_| error.to_string());
                        yield Ok(Event::default().event("error").data(body));
                        break;
                    }
                }
            }
        };

        Sse::new(stream).keep_alive(KeepAlive::default())
    }
}
