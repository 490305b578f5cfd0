// ABOUTME: Environment configuration for the chat relay server
// ABOUTME: Parses ports, database URL, upstream bounds, relay, credit, title, and CORS settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use url::Url;

use crate::constants::{credit, ports, relay, titles, upstream};

/// Default database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/chat_relay.db";
/// Default header carrying the verified user id
pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Upstream call bounds
    pub upstream: UpstreamConfig,
    /// Streaming relay settings
    pub relay: RelayConfig,
    /// Credit pre-check policy
    pub credit: CreditPolicy,
    /// Title generation settings
    pub titles: TitleGeneratorConfig,
    /// CORS settings
    pub cors: CorsConfig,
    /// Header name read by the trusted-header identity provider
    pub identity_header: String,
}

/// Time bounds for upstream provider calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// TCP/TLS connect bound
    pub connect_timeout: Duration,
    /// Whole-request bound for synchronous completions
    pub request_timeout: Duration,
    /// Whole-stream bound for streaming completions
    pub stream_timeout: Duration,
    /// Maximum silence between two upstream reads
    pub stream_idle_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(upstream::DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(upstream::DEFAULT_REQUEST_TIMEOUT_SECS),
            stream_timeout: Duration::from_secs(upstream::DEFAULT_STREAM_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(upstream::DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Streaming relay settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Capacity of the bounded client channel
    pub channel_capacity: usize,
    /// Whole-stream bound
    pub stream_timeout: Duration,
    /// Maximum silence between two upstream reads
    pub idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: relay::DEFAULT_CHANNEL_CAPACITY,
            stream_timeout: Duration::from_secs(upstream::DEFAULT_STREAM_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(upstream::DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Credit pre-check policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPolicy {
    /// Units whose cost a balance must cover before a call is made
    pub min_viable_units: u64,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            min_viable_units: credit::DEFAULT_MIN_VIABLE_UNITS.unsigned_abs(),
        }
    }
}

/// Title generation model settings
#[derive(Clone, PartialEq, Eq)]
pub struct TitleGeneratorConfig {
    /// Bearer credential; titles fall back to defaults when absent
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Model name
    pub model: String,
}

impl Default for TitleGeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: titles::DEFAULT_BASE_URL.to_owned(),
            model: titles::DEFAULT_MODEL.to_owned(),
        }
    }
}

impl std::fmt::Debug for TitleGeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleGeneratorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// CORS settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or if
    /// the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let stream_timeout = Duration::from_secs(env_parse_or(
            "UPSTREAM_STREAM_TIMEOUT_SECS",
            upstream::DEFAULT_STREAM_TIMEOUT_SECS,
        )?);
        let stream_idle_timeout = Duration::from_secs(env_parse_or(
            "UPSTREAM_STREAM_IDLE_TIMEOUT_SECS",
            upstream::DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
        )?);

        let config = Self {
            http_port: env_parse_or("HTTP_PORT", ports::DEFAULT_HTTP_PORT)?,
            database_url: env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            upstream: UpstreamConfig {
                connect_timeout: Duration::from_secs(env_parse_or(
                    "UPSTREAM_CONNECT_TIMEOUT_SECS",
                    upstream::DEFAULT_CONNECT_TIMEOUT_SECS,
                )?),
                request_timeout: Duration::from_secs(env_parse_or(
                    "UPSTREAM_REQUEST_TIMEOUT_SECS",
                    upstream::DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
                stream_timeout,
                stream_idle_timeout,
            },
            relay: RelayConfig {
                channel_capacity: env_parse_or(
                    "RELAY_CHANNEL_CAPACITY",
                    relay::DEFAULT_CHANNEL_CAPACITY,
                )?,
                stream_timeout,
                idle_timeout: stream_idle_timeout,
            },
            credit: CreditPolicy {
                min_viable_units: env_parse_or(
                    "CREDIT_MIN_VIABLE_UNITS",
                    credit::DEFAULT_MIN_VIABLE_UNITS.unsigned_abs(),
                )?,
            },
            titles: TitleGeneratorConfig {
                api_key: env::var("TITLE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                base_url: env_var_or("TITLE_BASE_URL", titles::DEFAULT_BASE_URL),
                model: env_var_or("TITLE_MODEL", titles::DEFAULT_MODEL),
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&env_var_or("CORS_ALLOWED_ORIGINS", "*")),
            },
            identity_header: env_var_or("IDENTITY_HEADER", DEFAULT_IDENTITY_HEADER)
                .to_ascii_lowercase(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.relay.channel_capacity == 0 {
            return Err(anyhow::anyhow!("RELAY_CHANNEL_CAPACITY must be at least 1"));
        }
        if self.upstream.stream_idle_timeout.is_zero() || self.upstream.request_timeout.is_zero() {
            return Err(anyhow::anyhow!("Upstream timeouts must be greater than zero"));
        }
        Url::parse(&self.titles.base_url)
            .with_context(|| format!("Invalid TITLE_BASE_URL '{}'", self.titles.base_url))?;
        if self.identity_header.trim().is_empty() {
            return Err(anyhow::anyhow!("IDENTITY_HEADER must not be empty"));
        }
        Ok(())
    }

    /// Configuration summary for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Chat Relay Configuration:\n\
             - HTTP Port: {}\n\
             - Database: {}\n\
             - Upstream timeouts: connect {}s, request {}s, stream {}s, idle {}s\n\
             - Relay channel capacity: {}\n\
             - Credit pre-check: {} units\n\
             - Title model: {} ({})\n\
             - CORS origins: {}",
            self.http_port,
            if self.database_url.contains(":memory:") {
                "SQLite (in-memory)"
            } else {
                "SQLite"
            },
            self.upstream.connect_timeout.as_secs(),
            self.upstream.request_timeout.as_secs(),
            self.upstream.stream_timeout.as_secs(),
            self.upstream.stream_idle_timeout.as_secs(),
            self.relay.channel_capacity,
            self.credit.min_viable_units,
            self.titles.model,
            if self.titles.api_key.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
            self.cors.allowed_origins.join(", "),
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: ports::DEFAULT_HTTP_PORT,
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            upstream: UpstreamConfig::default(),
            relay: RelayConfig::default(),
            credit: CreditPolicy::default(),
            titles: TitleGeneratorConfig::default(),
            cors: CorsConfig::default(),
            identity_header: DEFAULT_IDENTITY_HEADER.to_owned(),
        }
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, using the default when it is unset
fn env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value '{value}'")),
        Err(_) => Ok(default),
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
