// ABOUTME: Main library entry point for the chat completion relay
// ABOUTME: Unified chat API over several LLM providers with streaming, credit metering, and recording
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Chat Relay
//!
//! A relay that accepts one unified chat-completion request, routes it to a
//! configured provider, relays the answer (whole or streamed) back to the
//! caller, bills the exchange against a prepaid credit balance, and records it
//! into a conversation.
//!
//! ## Architecture
//!
//! - **Resolver**: model id to provider configuration and wire dialect
//! - **LLM**: unified request types, dialect adapters, SSE framing, transport
//! - **Credit**: pre-call affordability check and post-call atomic debit
//! - **Relay**: one task per stream, ordered delivery, exactly-once finalization
//! - **Recorder**: ownership check and turn persistence
//! - **Orchestrator**: the request lifecycle tying the above together
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chat_relay::config::ServerConfig;
//! use chat_relay::database::Database;
//! use chat_relay::resources::ServerResources;
//! use chat_relay::server::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let database = Database::new(&config.database_url).await?;
//!     let resources = Arc::new(ServerResources::from_config(&config, &database)?);
//!     RelayServer::new(resources, config).run().await
//! }
//! ```

/// Unified error handling
pub mod errors;

/// Application constants
pub mod constants;

/// Configuration loaded from the environment
pub mod config;

/// Structured logging setup
pub mod logging;

/// Core domain types: money, model configuration, usage
pub mod models;

/// Unified chat types, provider dialects, and upstream transport
pub mod llm;

/// Model resolution and adapter selection
pub mod resolver;

/// Credit pre-check and debit
pub mod credit;

/// Conversation recording
pub mod recorder;

/// Bill-then-record finalization shared by both turn paths
pub mod finalize;

/// Streaming relay
pub mod relay;

/// Chat turn orchestration
pub mod orchestrator;

/// Conversation title generation
pub mod titles;

/// Caller identity resolution
pub mod identity;

/// `SQLite` storage adapters
pub mod database;

/// HTTP middleware
pub mod middleware;

/// Shared server resources
pub mod resources;

/// HTTP routes
pub mod routes;

/// HTTP server lifecycle
pub mod server;
