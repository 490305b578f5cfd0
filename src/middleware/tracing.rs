// ABOUTME: Request tracing helpers for correlation and structured logging
// ABOUTME: Builds one span per HTTP request carrying the propagated request ID
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::body::Body;
use http::Request;
use tracing::{info_span, Span};

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Span for one HTTP request, tagged with its request ID
///
/// The ID is set by `SetRequestIdLayer` before the trace layer runs, so every
/// relay and orchestrator log line inside the request shares it.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}
