// ABOUTME: Native chunk wire dialect (Ollama-style local model servers)
// ABOUTME: Newline-delimited JSON chunks with a done flag and eval-count usage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Native Chunk Dialect
//!
//! Request body: `{model, messages, stream, options:{temperature, top_p,
//! num_predict, frequency_penalty, presence_penalty, stop}}`.
//!
//! Every response object, streamed or not, looks like
//! `{model, message:{role, content}, done, done_reason?, usage?}` with usage
//! either nested (`usage.prompt_tokens`) or flattened on the final object
//! (`prompt_eval_count`, `eval_count`). A missing total is computed from the
//! prompt and completion counts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, ChatTurnRequest, CompletionPayload, FinishReason, NormalizedChunk};
use crate::errors::{AppError, AppResult};
use crate::models::{ModelConfig, UsageRecord};

#[derive(Debug, Serialize)]
struct NativeRequest<'a> {
    model: &'a str,
    messages: Vec<NativeOutboundMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "NativeOptions::is_empty")]
    options: NativeOptions<'a>,
}

#[derive(Debug, Serialize)]
struct NativeOutboundMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for NativeOutboundMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
            name: msg.name.as_deref(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct NativeOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

impl NativeOptions<'_> {
    const fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.num_predict.is_none()
            && self.frequency_penalty.is_none()
            && self.presence_penalty.is_none()
            && self.stop.is_none()
    }
}

/// Inbound object; `done` is required so OpenAI-style chunks never match
#[derive(Debug, Deserialize)]
struct NativeChunk {
    #[serde(default)]
    message: Option<NativeMessage>,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<NativeUsage>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NativeMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NativeUsage {
    #[serde(default, alias = "prompt_eval_count")]
    prompt_tokens: Option<u32>,
    #[serde(default, alias = "eval_count")]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl NativeChunk {
    fn usage(&self) -> Option<UsageRecord> {
        if let Some(usage) = &self.usage {
            return Some(UsageRecord::from_parts(
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
            ));
        }
        if self.prompt_eval_count.is_some() || self.eval_count.is_some() {
            return Some(UsageRecord::from_parts(
                self.prompt_eval_count,
                self.eval_count,
                None,
            ));
        }
        None
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        if !self.done {
            return None;
        }
        self.done_reason
            .as_deref()
            .and_then(FinishReason::from_wire)
            .or(Some(FinishReason::Stop))
    }
}

/// Encode the outbound request body
#[must_use]
pub fn build_request(model: &ModelConfig, request: &ChatTurnRequest, stream: bool) -> Value {
    let sampling = &request.sampling;
    let body = NativeRequest {
        model: &model.model_name,
        messages: request
            .messages
            .iter()
            .map(NativeOutboundMessage::from)
            .collect(),
        stream,
        options: NativeOptions {
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            num_predict: sampling.max_tokens,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            stop: sampling.stop.as_deref(),
        },
    };
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Decode a whole (non-streamed) response object
///
/// # Errors
///
/// Returns a serialization error when the body is not a native response object.
pub fn parse_response(body: &str) -> AppResult<CompletionPayload> {
    let chunk: NativeChunk = serde_json::from_str(body)
        .map_err(|e| AppError::serialization(format!("Unrecognized completion response: {e}")))?;

    let usage = chunk.usage();
    let finish_reason = chunk.finish_reason();
    Ok(CompletionPayload {
        content: chunk
            .message
            .and_then(|message| message.content)
            .unwrap_or_default(),
        finish_reason,
        usage,
        model: chunk.model,
    })
}

/// Decode one stream payload
///
/// # Errors
///
/// Returns the decoder error when the payload is not a native chunk.
pub fn parse_chunk(payload: &str) -> Result<NormalizedChunk, serde_json::Error> {
    let chunk: NativeChunk = serde_json::from_str(payload)?;
    let usage = chunk.usage();
    let finish_reason = chunk.finish_reason();

    Ok(NormalizedChunk {
        delta_content: chunk
            .message
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty()),
        finish_reason,
        usage,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::llm::SamplingParams;
    use crate::models::Credits;

    #[test]
    fn test_build_request_maps_max_tokens_to_num_predict() {
        let model = ModelConfig {
            id: 2,
            provider_tag: "ollama".to_owned(),
            model_name: "qwen2.5:7b".to_owned(),
            api_endpoint: "http://localhost:11434/api/chat".to_owned(),
            credential: String::new(),
            price_per_1000_units: Credits::ZERO,
            enabled: true,
        };
        let request = ChatTurnRequest {
            model_id: 2,
            conversation_id: 1,
            messages: vec![ChatMessage::user("Hi")],
            stream: true,
            sampling: SamplingParams {
                max_tokens: Some(64),
                ..SamplingParams::default()
            },
        };

        let body = build_request(&model, &request, true);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["stream"], true);

        let bare = build_request(
            &model,
            &ChatTurnRequest {
                sampling: SamplingParams::default(),
                ..request
            },
            false,
        );
        assert!(bare.get("options").is_none());
    }

    #[test]
    fn test_build_request_forwards_message_name() {
        let model = ModelConfig {
            id: 2,
            provider_tag: "ollama".to_owned(),
            model_name: "qwen2.5:7b".to_owned(),
            api_endpoint: "http://localhost:11434/api/chat".to_owned(),
            credential: String::new(),
            price_per_1000_units: Credits::ZERO,
            enabled: true,
        };
        let request = ChatTurnRequest {
            model_id: 2,
            conversation_id: 1,
            messages: vec![ChatMessage::user("Hi").with_name("alice_01")],
            stream: false,
            sampling: SamplingParams::default(),
        };

        let body = build_request(&model, &request, false);
        assert_eq!(body["messages"][0]["name"], "alice_01");
    }

    #[test]
    fn test_done_chunk_with_flat_counts() {
        let chunk = parse_chunk(
            r#"{"model":"qwen","message":{"role":"assistant","content":""},"done":true,"prompt_eval_count":4,"eval_count":6}"#,
        )
        .unwrap();
        assert_eq!(chunk.delta_content, None);
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
        assert_eq!(chunk.usage, Some(UsageRecord::new(4, 6)));
    }

    #[test]
    fn test_nested_usage_without_total() {
        let chunk = parse_chunk(
            r#"{"message":{"role":"assistant","content":"!"},"done":true,"done_reason":"length","usage":{"prompt_tokens":3,"completion_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(chunk.delta_content.as_deref(), Some("!"));
        assert_eq!(chunk.finish_reason, Some(FinishReason::Length));
        assert_eq!(chunk.usage.map(|u| u.total_units), Some(5));
    }
}
