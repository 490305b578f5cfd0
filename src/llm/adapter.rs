// ABOUTME: Protocol adapter selecting the wire dialect spoken by an upstream model
// ABOUTME: Dispatches request encoding and response/chunk decoding, with two-dialect chunk fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde_json::Value;
use thiserror::Error;

use super::{native_chunk, openai_compatible, ChatTurnRequest, FinishReason, NormalizedChunk};
use crate::errors::{AppError, AppResult};
use crate::models::{ModelConfig, UsageRecord};

/// Decoded non-streamed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPayload {
    /// Assistant text
    pub content: String,
    /// Finish reason, when reported
    pub finish_reason: Option<FinishReason>,
    /// Usage, when reported
    pub usage: Option<UsageRecord>,
    /// Model name echoed by the provider
    pub model: Option<String>,
}

/// A stream payload matched neither dialect
#[derive(Debug, Error)]
#[error("chunk matched no known dialect (native: {native}; openai: {openai})")]
pub struct ChunkParseError {
    native: serde_json::Error,
    openai: serde_json::Error,
}

impl From<ChunkParseError> for AppError {
    fn from(error: ChunkParseError) -> Self {
        Self::chunk_parse(error.to_string()).with_source(error)
    }
}

/// Wire dialect spoken by an upstream provider
///
/// Adding a provider that speaks an existing dialect only needs a registry
/// entry mapping its tag; a new dialect adds a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolAdapter {
    /// `choices[].delta` SSE dialect (DeepSeek, OpenAI, vLLM)
    OpenAiCompatible,
    /// `{message, done}` newline-delimited dialect (Ollama)
    NativeChunkFormat,
}

impl ProtocolAdapter {
    /// Adapter name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatible",
            Self::NativeChunkFormat => "native-chunk",
        }
    }

    /// Encode the outbound request body
    #[must_use]
    pub fn build_request(
        self,
        model: &ModelConfig,
        request: &ChatTurnRequest,
        stream: bool,
    ) -> Value {
        match self {
            Self::OpenAiCompatible => openai_compatible::build_request(model, request, stream),
            Self::NativeChunkFormat => native_chunk::build_request(model, request, stream),
        }
    }

    /// Decode a whole completion response in this adapter's dialect
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the body does not match the dialect.
    pub fn parse_response(self, body: &str) -> AppResult<CompletionPayload> {
        match self {
            Self::OpenAiCompatible => openai_compatible::parse_response(body),
            Self::NativeChunkFormat => native_chunk::parse_response(body),
        }
    }

    /// Decode one stream payload
    ///
    /// Providers behind a shared tag do not always agree on a dialect, so the
    /// native shape is tried first and the OpenAI shape second, independent of
    /// which adapter was selected.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkParseError`] when neither dialect matches; the caller
    /// skips the chunk and keeps streaming.
    pub fn parse_chunk(self, payload: &str) -> Result<NormalizedChunk, ChunkParseError> {
        match native_chunk::parse_chunk(payload) {
            Ok(chunk) => Ok(chunk),
            Err(native) => openai_compatible::parse_chunk(payload)
                .map_err(|openai| ChunkParseError { native, openai }),
        }
    }
}
