// ABOUTME: OpenAI-compatible wire dialect (DeepSeek, OpenAI, vLLM, LocalAI)
// ABOUTME: Encodes chat requests and decodes completion responses and SSE stream chunks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OpenAI-Compatible Dialect
//!
//! Request body: `{model, messages, stream, temperature?, max_tokens?, top_p?,
//! frequency_penalty?, presence_penalty?, stop?}`.
//!
//! Response body: `{choices:[{message:{content}, finish_reason}], usage:{prompt_tokens,
//! completion_tokens, total_tokens}}`.
//!
//! Stream chunk: `{choices:[{delta:{content}, finish_reason}], usage?}`. Usage
//! usually rides on the final chunk or on a trailing chunk with empty `choices`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, ChatTurnRequest, CompletionPayload, FinishReason, NormalizedChunk};
use crate::errors::{AppError, AppResult};
use crate::models::{ModelConfig, UsageRecord};

// ============================================================================
// API Request/Response Types
// ============================================================================

/// OpenAI-compatible API request structure
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

/// Message structure for OpenAI-compatible API
#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for OpenAiMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
            name: msg.name.as_deref(),
        }
    }
}

/// OpenAI-compatible API response structure
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

/// Choice in response
#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Message in response
#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Usage statistics
#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<OpenAiUsage> for UsageRecord {
    fn from(usage: OpenAiUsage) -> Self {
        Self::from_parts(
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
        )
    }
}

/// Streaming chunk structure; `choices` is required so other dialects do not match
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

/// Choice in streaming chunk
#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Delta content in streaming chunk
#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error response structure, `{"error": {"message": ...}}` or `{"error": "..."}`
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenAiErrorBody {
    Detailed { message: String },
    Plain(String),
}

// ============================================================================
// Dialect Operations
// ============================================================================

/// Encode the outbound request body
#[must_use]
pub fn build_request(model: &ModelConfig, request: &ChatTurnRequest, stream: bool) -> Value {
    let sampling = &request.sampling;
    let body = OpenAiRequest {
        model: &model.model_name,
        messages: request.messages.iter().map(OpenAiMessage::from).collect(),
        stream,
        temperature: sampling.temperature,
        max_tokens: sampling.max_tokens,
        top_p: sampling.top_p,
        frequency_penalty: sampling.frequency_penalty,
        presence_penalty: sampling.presence_penalty,
        stop: sampling.stop.as_deref(),
    };
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Decode a whole (non-streamed) completion response
///
/// # Errors
///
/// Returns a serialization error when the body is not an OpenAI-style response
/// or carries no choices.
pub fn parse_response(body: &str) -> AppResult<CompletionPayload> {
    let response: OpenAiResponse = serde_json::from_str(body).map_err(|e| {
        AppError::serialization(format!("Unrecognized completion response: {e}"))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::serialization("Completion response contained no choices"))?;

    Ok(CompletionPayload {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .and_then(FinishReason::from_wire),
        usage: response.usage.map(UsageRecord::from),
        model: response.model,
    })
}

/// Decode one stream payload
///
/// # Errors
///
/// Returns the decoder error when the payload is not an OpenAI-style chunk.
pub fn parse_chunk(payload: &str) -> Result<NormalizedChunk, serde_json::Error> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(payload)?;
    let choice = chunk.choices.into_iter().next();

    let (delta_content, finish_reason) = choice.map_or((None, None), |choice| {
        (
            choice
                .delta
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty()),
            choice
                .finish_reason
                .as_deref()
                .and_then(FinishReason::from_wire),
        )
    });

    Ok(NormalizedChunk {
        delta_content,
        finish_reason,
        usage: chunk.usage.map(UsageRecord::from),
    })
}

/// Extract the provider's error message from an error body, if it has one
#[must_use]
pub fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiErrorResponse>(body)
        .ok()
        .map(|response| match response.error {
            OpenAiErrorBody::Detailed { message } | OpenAiErrorBody::Plain(message) => message,
        })
        .filter(|message| !message.trim().is_empty())
}
