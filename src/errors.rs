// ABOUTME: Unified error handling re-exported from chat-relay-core
// ABOUTME: AppError, ErrorCode, AppResult, and the structured error response body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use chat_relay_core::errors::*;
