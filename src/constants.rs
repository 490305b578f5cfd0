// ABOUTME: Application constants re-exported from chat-relay-core
// ABOUTME: Ports, routes, upstream timeouts, relay, credit, and title defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use chat_relay_core::constants::*;
