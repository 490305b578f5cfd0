// ABOUTME: Constants shared across the relay, grouped by domain
// ABOUTME: Default ports, timeouts, metering parameters, and wire sentinels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Pure data constants grouped by domain. Runtime-overridable values have their
//! environment variable names next to the default.

/// Service identity used in structured logs
pub mod service_names {
    /// Name of the relay server
    pub const CHAT_RELAY_SERVER: &str = "chat-relay-server";
}

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}

/// API routes
pub mod routes {
    /// Health route
    pub const HEALTH: &str = "/health";
    /// Unified chat completion route
    pub const CHAT_COMPLETIONS: &str = "/api/v1/chat/completions";
    /// Conversation title generation route
    pub const CHAT_TITLES: &str = "/api/v1/chat/titles";
}

/// Upstream provider call bounds
pub mod upstream {
    /// Connect timeout for provider calls
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Whole-request bound for synchronous completions
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
    /// Whole-stream bound for streaming completions
    pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 120;
    /// Maximum gap between two upstream reads while streaming
    pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;
    /// Characters of an upstream error body kept as diagnostic text
    pub const DIAGNOSTIC_PREVIEW_CHARS: usize = 200;
}

/// Streaming relay parameters
pub mod relay {
    /// Bounded capacity of the client-facing event channel
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;
    /// Terminal sentinel of OpenAI-style SSE streams
    pub const DONE_SENTINEL: &str = "[DONE]";
}

/// Credit metering parameters
pub mod credit {
    /// Micro-credits per whole credit (fixed 6-decimal precision)
    pub const MICROS_PER_CREDIT: i64 = 1_000_000;
    /// Price unit: prices are quoted per this many tokens
    pub const UNITS_PER_PRICE: i64 = 1_000;
    /// Units priced by the pre-check minimum balance
    pub const DEFAULT_MIN_VIABLE_UNITS: i64 = 100;
}

/// Conversation title generation
pub mod titles {
    /// Default OpenAI-compatible base URL for the title model
    pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
    /// Default title model
    pub const DEFAULT_MODEL: &str = "qwen-turbo";
    /// Request timeout for title generation
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Fallback for regular titles
    pub const DEFAULT_TITLE: &str = "New conversation";
    /// Fallback for summary titles
    pub const DEFAULT_SUMMARY_TITLE: &str = "Conversation summary";
    /// Messages considered for a regular title
    pub const MAX_TITLE_MESSAGES: usize = 10;
    /// Per-message character cap for a regular title prompt
    pub const TITLE_MESSAGE_CHARS: usize = 200;
    /// Messages longer than this are elided in a summary prompt
    pub const SUMMARY_ELIDE_THRESHOLD: usize = 300;
    /// Characters kept from the start of an elided message
    pub const SUMMARY_HEAD_CHARS: usize = 150;
    /// Characters kept from the end of an elided message
    pub const SUMMARY_TAIL_CHARS: usize = 100;
    /// Maximum title length before truncation
    pub const MAX_TITLE_CHARS: usize = 50;
}
