// ABOUTME: HTTP middleware for CORS and request tracing
// ABOUTME: Layers applied around every route of the relay router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Cross-origin request policy
pub mod cors;
/// Request ID propagation and per-request spans
pub mod tracing;

pub use cors::setup_cors;
pub use tracing::{request_span, REQUEST_ID_HEADER};
