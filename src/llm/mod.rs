// ABOUTME: Upstream LLM protocol layer for the chat relay
// ABOUTME: Message/request types, normalized chunks, dialect adapters, transport, and usage estimation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Protocol Layer
//!
//! Everything that touches the wire format of an upstream model provider:
//!
//! - **`ChatTurnRequest`**: validated, provider-agnostic request for one turn
//! - **`NormalizedChunk`**: dialect-independent streaming delta
//! - **`ProtocolAdapter`**: encodes requests and decodes responses/chunks per dialect
//! - **`UpstreamTransport`**: sends the encoded body and returns text or a byte stream
//! - **`UsageEstimator`**: fallback unit counting when a provider omits usage
//!
//! ## Example
//!
//! ```rust,no_run
//! use chat_relay::llm::{ChatMessage, ProtocolAdapter};
//!
//! let chunk = ProtocolAdapter::OpenAiCompatible
//!     .parse_chunk(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
//! assert!(chunk.is_ok());
//! let _ = ChatMessage::user("Hello");
//! ```

mod adapter;
pub mod estimator;
pub mod native_chunk;
pub mod openai_compatible;
pub mod sse_parser;
pub mod transport;

pub use adapter::{ChunkParseError, CompletionPayload, ProtocolAdapter};
pub use estimator::UsageEstimator;
pub use sse_parser::{SseEvent, SseLineBuffer};
pub use transport::{ByteStream, ReqwestTransport, UpstreamRequest, UpstreamTransport};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::{ConversationId, ModelId, UsageRecord};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
    /// Tool result message
    Tool,
    /// Legacy function result message
    Function,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            "function" => Ok(Self::Function),
            other => Err(AppError::invalid_input(format!(
                "Unsupported message role '{other}'"
            ))),
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
    /// Participant name, used by tool and function messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    /// Attach a participant name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Optional sampling parameters forwarded to the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingParams {
    /// Temperature for response randomness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum units to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Penalty for repeated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Penalty for already-present tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Validated request for one conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnRequest {
    /// Registry key of the target model
    pub model_id: ModelId,
    /// Conversation the turn belongs to
    pub conversation_id: ConversationId,
    /// Ordered prompt messages, never empty
    pub messages: Vec<ChatMessage>,
    /// Whether the client wants a streamed answer
    pub stream: bool,
    /// Sampling parameters
    pub sampling: SamplingParams,
}

/// Most recent user-role message, the one persisted with the turn
#[must_use]
pub fn last_user_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().rev().find(|m| m.role == MessageRole::User)
}

/// Inbound message as sent by clients, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    /// Role string
    #[serde(default)]
    pub role: Option<String>,
    /// Message text
    #[serde(default)]
    pub content: Option<String>,
    /// Optional participant name
    #[serde(default)]
    pub name: Option<String>,
}

/// Inbound chat completion body, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionRequest {
    /// Registry key of the target model
    #[serde(default)]
    pub model_id: Option<ModelId>,
    /// Conversation to append to
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// Prompt messages
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    /// Stream flag
    #[serde(default)]
    pub stream: bool,
    /// Sampling parameters
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

/// Longest participant name providers accept
const MAX_NAME_LEN: usize = 64;

fn validate_name(index: usize, name: String) -> AppResult<String> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(AppError::invalid_input(format!(
            "messages[{index}].name must be 1-{MAX_NAME_LEN} letters, digits, '_' or '-'"
        )))
    }
}

impl ChatCompletionRequest {
    /// Validate the body and convert it into a [`ChatTurnRequest`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the model or conversation id is missing, the
    /// message list is empty, or any message has a blank role or content.
    pub fn validate(self) -> AppResult<ChatTurnRequest> {
        let model_id = self
            .model_id
            .ok_or_else(|| AppError::invalid_input("modelId is required"))?;
        let conversation_id = self
            .conversation_id
            .ok_or_else(|| AppError::invalid_input("conversationId is required"))?;
        if self.messages.is_empty() {
            return Err(AppError::invalid_input("messages must not be empty"));
        }

        let messages = self
            .messages
            .into_iter()
            .enumerate()
            .map(|(index, message)| {
                let role = message
                    .role
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::invalid_input(format!("messages[{index}].role must not be blank"))
                    })?
                    .parse::<MessageRole>()?;
                let content = message
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::invalid_input(format!(
                            "messages[{index}].content must not be blank"
                        ))
                    })?;
                let name = message
                    .name
                    .map(|name| validate_name(index, name))
                    .transpose()?;
                Ok(ChatMessage {
                    role,
                    content,
                    name,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        if let Some(temperature) = self.sampling.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AppError::invalid_input(
                    "temperature must be between 0 and 2",
                ));
            }
        }
        if let Some(top_p) = self.sampling.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(AppError::invalid_input("topP must be between 0 and 1"));
            }
        }

        Ok(ChatTurnRequest {
            model_id,
            conversation_id,
            messages,
            stream: self.stream,
            sampling: self.sampling,
        })
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Why the provider stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer
    Stop,
    /// Output limit reached
    Length,
    /// Model requested a tool call
    ToolCalls,
    /// Output withheld by a content filter
    ContentFilter,
}

impl FinishReason {
    /// Map a provider finish string; unknown non-empty values count as `Stop`
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            "length" => Some(Self::Length),
            "tool_calls" | "function_call" => Some(Self::ToolCalls),
            "content_filter" => Some(Self::ContentFilter),
            _ => Some(Self::Stop),
        }
    }
}

/// One dialect-independent streaming delta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedChunk {
    /// Appended text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_content: Option<String>,
    /// Set on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage, typically only on the last chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageRecord>,
}

impl NormalizedChunk {
    /// Chunk carrying only a text delta
    #[must_use]
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            delta_content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// A choice in a synchronous completion response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionChoice {
    /// Choice index, always 0
    pub index: u32,
    /// Assistant message
    pub message: ChatMessage,
    /// Finish reason reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Synchronous chat completion response returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    /// Response identifier
    pub id: String,
    /// Object type, always `chat.completion`
    pub object: String,
    /// Unix timestamp of creation
    pub created: i64,
    /// Upstream model name
    pub model: String,
    /// Single-element choice list
    pub choices: Vec<CompletionChoice>,
    /// Billed usage
    pub usage: UsageRecord,
}
