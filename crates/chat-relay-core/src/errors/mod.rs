// ABOUTME: Unified error handling with error codes, HTTP status mapping, and response bodies
// ABOUTME: Every relay, metering, and persistence failure is expressed as an AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling System
//!
//! Centralized error type for the chat relay. Client input errors, business rule
//! violations (credit), upstream provider failures, and persistence failures all
//! carry an [`ErrorCode`] that decides the HTTP status and the machine-readable
//! code in the structured error body.

#[cfg(feature = "database-errors")]
mod database;
#[cfg(feature = "http-response")]
mod http_response;
#[cfg(feature = "provider-errors")]
mod provider;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the relay
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Client input (4xx)
    /// Request body failed validation
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// No verified user identity accompanied the request
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// Model id is not present in the registry
    #[serde(rename = "MODEL_NOT_FOUND")]
    ModelNotFound,
    /// Model exists but is switched off
    #[serde(rename = "MODEL_DISABLED")]
    ModelDisabled,
    /// Credit balance cannot cover the request
    #[serde(rename = "INSUFFICIENT_CREDIT")]
    InsufficientCredit,
    /// Conversation does not exist or belongs to someone else
    #[serde(rename = "CONVERSATION_ACCESS_DENIED")]
    ConversationAccess,
    /// Generic missing resource
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// A single streamed chunk could not be parsed
    #[serde(rename = "CHUNK_PARSE_ERROR")]
    ChunkParse,

    // Upstream provider (5xx)
    /// Connection or read failure talking to the provider
    #[serde(rename = "UPSTREAM_TRANSPORT_ERROR")]
    UpstreamTransport,
    /// Provider did not answer within the configured bound
    #[serde(rename = "UPSTREAM_TIMEOUT")]
    UpstreamTimeout,
    /// Provider answered with a non-success status
    #[serde(rename = "UPSTREAM_REJECTED")]
    UpstreamRejected,

    // Internal (5xx)
    /// Configuration is missing or invalid
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    /// Serialization or deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError,
    /// Anything else
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::ModelDisabled => 400,
            Self::AuthRequired => 401,
            Self::InsufficientCredit => 402,
            Self::ConversationAccess => 403,
            Self::ModelNotFound | Self::ResourceNotFound => 404,
            Self::ChunkParse => 422,
            Self::UpstreamTransport | Self::UpstreamRejected => 502,
            Self::UpstreamTimeout => 504,
            Self::ConfigError
            | Self::DatabaseError
            | Self::SerializationError
            | Self::InternalError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input provided",
            Self::AuthRequired => "Authentication is required",
            Self::ModelNotFound => "The requested model does not exist",
            Self::ModelDisabled => "The requested model is disabled",
            Self::InsufficientCredit => "Insufficient credit balance",
            Self::ConversationAccess => "Conversation not found or access denied",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ChunkParse => "A streamed chunk could not be parsed",
            Self::UpstreamTransport => "The upstream provider could not be reached",
            Self::UpstreamTimeout => "The upstream provider timed out",
            Self::UpstreamRejected => "The upstream provider rejected the request",
            Self::ConfigError => "Configuration error encountered",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
            Self::InternalError => "An internal server error occurred",
        }
    }

    /// Whether this error is caused by the client rather than the server
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        self.http_status() < 500
    }
}

/// Unified error type for the relay
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details for the response body
    pub details: Option<serde_json::Value>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing or unverifiable identity
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Model id not present in the registry
    #[must_use]
    pub fn model_not_found(model_id: i64) -> Self {
        Self::new(ErrorCode::ModelNotFound, format!("Model {model_id} not found"))
    }

    /// Model present but disabled
    #[must_use]
    pub fn model_disabled(model_id: i64) -> Self {
        Self::new(
            ErrorCode::ModelDisabled,
            format!("Model {model_id} is disabled"),
        )
    }

    /// Balance cannot cover the required amount
    pub fn insufficient_credit(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientCredit, message)
    }

    /// Conversation missing or owned by another user
    #[must_use]
    pub fn conversation_access(conversation_id: i64) -> Self {
        Self::new(
            ErrorCode::ConversationAccess,
            format!("Conversation {conversation_id} does not exist or is not accessible"),
        )
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Chunk could not be parsed in any known dialect
    pub fn chunk_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChunkParse, message)
    }

    /// Transport-level failure talking to an upstream provider
    pub fn upstream_transport(provider: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UpstreamTransport,
            format!("{provider}: {}", message.into()),
        )
    }

    /// Upstream provider exceeded the configured time bound
    pub fn upstream_timeout(provider: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UpstreamTimeout,
            format!("{provider}: {}", message.into()),
        )
    }

    /// Upstream provider answered with a non-success status
    pub fn upstream_rejected(provider: &str, status: u16, diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        Self::new(
            ErrorCode::UpstreamRejected,
            format!("{provider} returned {status}: {diagnostic}"),
        )
        .with_details(serde_json::json!({
            "upstream_status": status,
            "upstream_message": diagnostic,
        }))
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string()).with_source(error)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Body of an error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Cause description
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message.clone(),
                details: error.details.clone(),
            },
        }
    }
}
