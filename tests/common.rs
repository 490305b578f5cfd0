// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, seeded in-memory databases, and a scripted upstream transport
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `chat_relay`

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use bytes::Bytes;
use chat_relay::config::ServerConfig;
use chat_relay::database::Database;
use chat_relay::errors::{AppError, AppResult};
use chat_relay::llm::{ByteStream, UpstreamRequest, UpstreamTransport};
use chat_relay::models::{ConversationId, Credits, ModelConfig, UserId};
use chat_relay::orchestrator::ChatOrchestrator;
use chat_relay::resources::ServerResources;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// Priced OpenAI-compatible model: 0.014 credits per 1000 units
pub const DEEPSEEK_MODEL_ID: i64 = 1;
/// Native-dialect model
pub const OLLAMA_MODEL_ID: i64 = 2;
/// Disabled model
pub const DISABLED_MODEL_ID: i64 = 3;
/// Free model
pub const FREE_MODEL_ID: i64 = 4;

/// Owner of the seeded conversation
pub const ALICE: UserId = 10;
/// Another user with credit but no conversation
pub const BOB: UserId = 20;

pub fn deepseek_model() -> ModelConfig {
    ModelConfig {
        id: DEEPSEEK_MODEL_ID,
        provider_tag: "deepseek".to_owned(),
        model_name: "deepseek-chat".to_owned(),
        api_endpoint: "https://api.deepseek.test/chat/completions".to_owned(),
        credential: "sk-test".to_owned(),
        price_per_1000_units: Credits::from_micros(14_000),
        enabled: true,
    }
}

pub fn ollama_model() -> ModelConfig {
    ModelConfig {
        id: OLLAMA_MODEL_ID,
        provider_tag: "ollama".to_owned(),
        model_name: "llama3".to_owned(),
        api_endpoint: "http://localhost:11434/api/chat".to_owned(),
        credential: String::new(),
        price_per_1000_units: Credits::from_micros(2_000),
        enabled: true,
    }
}

pub fn disabled_model() -> ModelConfig {
    ModelConfig {
        id: DISABLED_MODEL_ID,
        enabled: false,
        ..deepseek_model()
    }
}

pub fn free_model() -> ModelConfig {
    ModelConfig {
        id: FREE_MODEL_ID,
        price_per_1000_units: Credits::ZERO,
        ..deepseek_model()
    }
}

/// Seeded in-memory database
pub struct TestDatabase {
    pub database: Database,
    /// Conversation owned by `ALICE`
    pub conversation_id: ConversationId,
}

/// In-memory database with the four models, two funded users, and one conversation
pub async fn create_test_database(balance: Credits) -> TestDatabase {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await.unwrap();
    for model in [deepseek_model(), ollama_model(), disabled_model(), free_model()] {
        database.upsert_model(&model).await.unwrap();
    }
    database.create_credit_account(ALICE, balance).await.unwrap();
    database.create_credit_account(BOB, balance).await.unwrap();
    let conversation_id = database.create_conversation(ALICE, "Test chat").await.unwrap();

    TestDatabase {
        database,
        conversation_id,
    }
}

/// Server resources over a seeded database and a scripted transport
pub fn create_test_resources(
    database: &Database,
    transport: Arc<ScriptedTransport>,
) -> Arc<ServerResources> {
    let mut config = ServerConfig::default();
    config.titles.api_key = Some("title-key".to_owned());
    Arc::new(ServerResources::with_transport(&config, database, transport))
}

/// Orchestrator over a seeded database and a scripted transport
pub fn create_test_orchestrator(
    database: &Database,
    transport: Arc<ScriptedTransport>,
) -> ChatOrchestrator {
    create_test_resources(database, transport).orchestrator.clone()
}

/// Current balance of a user
pub async fn balance_of(database: &Database, user_id: UserId) -> Credits {
    let micros: i64 =
        sqlx::query_scalar("SELECT balance_micros FROM credit_accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(database.pool())
            .await
            .unwrap();
    Credits::from_micros(micros)
}

// ============================================================================
// Scripted upstream
// ============================================================================

/// Scripted outcome of one streaming call
pub enum StreamScript {
    /// Yield these reads, then end
    Reads(Vec<AppResult<Bytes>>),
    /// Yield these reads, then never produce anything again
    ReadsThenHang(Vec<Bytes>),
    /// Reads are pushed by the test through the paired sender
    Channel(mpsc::Receiver<AppResult<Bytes>>),
    /// Fail to open
    OpenError(AppError),
}

impl StreamScript {
    /// Reads from string slices
    pub fn reads(reads: &[&str]) -> Self {
        Self::Reads(
            reads
                .iter()
                .map(|r| Ok(Bytes::copy_from_slice(r.as_bytes())))
                .collect(),
        )
    }

    /// Channel-driven stream and its sender
    pub fn channel() -> (mpsc::Sender<AppResult<Bytes>>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self::Channel(rx))
    }
}

/// Upstream test double replaying scripted responses in order
#[derive(Default)]
pub struct ScriptedTransport {
    json: Mutex<VecDeque<AppResult<String>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a synchronous response body
    pub fn push_json(&self, body: impl Into<String>) {
        self.json.lock().unwrap().push_back(Ok(body.into()));
    }

    /// Queue a synchronous failure
    pub fn push_json_error(&self, error: AppError) {
        self.json.lock().unwrap().push_back(Err(error));
    }

    /// Queue a streaming outcome
    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    /// Number of upstream calls made
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn send_json(&self, request: UpstreamRequest) -> AppResult<String> {
        self.requests.lock().unwrap().push(request);
        self.json
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::internal("no scripted response")))
    }

    async fn send_stream(&self, request: UpstreamRequest) -> AppResult<ByteStream> {
        self.requests.lock().unwrap().push(request);
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(StreamScript::Reads(reads)) => Ok(stream::iter(reads).boxed()),
            Some(StreamScript::ReadsThenHang(reads)) => Ok(stream::iter(reads.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Some(StreamScript::Channel(rx)) => Ok(ReceiverStream::new(rx).boxed()),
            Some(StreamScript::OpenError(error)) => Err(error),
            None => Err(AppError::internal("no scripted stream")),
        }
    }
}

// ============================================================================
// Canned provider payloads
// ============================================================================

/// OpenAI-style synchronous response
pub fn openai_response(content: &str, prompt: u32, completion: u32) -> String {
    serde_json::json!({
        "id": "cmpl-1",
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "total_tokens": prompt + completion
        }
    })
    .to_string()
}

/// One OpenAI-style SSE content frame
pub fn openai_delta(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
        })
    )
}

/// OpenAI-style SSE frame carrying a finish reason
pub fn openai_finish(reason: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
    )
}

/// OpenAI-style SSE usage frame
pub fn openai_usage(prompt: u32, completion: u32) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [], "usage": {
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "total_tokens": prompt + completion
        }})
    )
}

/// OpenAI-style terminal sentinel
pub const OPENAI_DONE: &str = "data: [DONE]\n\n";

/// One native-dialect JSON line
pub fn native_line(content: &str, done: bool) -> String {
    let mut line = serde_json::json!({
        "model": "llama3",
        "message": {"role": "assistant", "content": content},
        "done": done
    });
    if done {
        line["prompt_eval_count"] = 9.into();
        line["eval_count"] = 4.into();
    }
    format!("{line}\n")
}
