// ABOUTME: Configuration module for centralized server settings
// ABOUTME: Re-exports the environment-driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the chat relay
//!
//! - **Environment**: server configuration from environment variables

/// Environment and server configuration
pub mod environment;

pub use environment::{
    CorsConfig, CreditPolicy, RelayConfig, ServerConfig, TitleGeneratorConfig, UpstreamConfig,
};
