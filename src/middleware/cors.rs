// ABOUTME: CORS middleware configuration for the relay HTTP API
// ABOUTME: Provides Cross-Origin Resource Sharing setup for browser chat clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Configure CORS for the relay routes
///
/// Origins come from `CORS_ALLOWED_ORIGINS`. A wildcard (or a list where no
/// entry parses as a header value) allows any origin. The identity header is
/// allowed so browser clients behind a trusted proxy can still reach the API.
///
/// ```bash
/// export CORS_ALLOWED_ORIGINS="https://chat.example.com,https://admin.example.com"
/// ```
#[must_use]
pub fn setup_cors(config: &CorsConfig, identity_header: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    let mut headers = vec![
        HeaderName::from_static("content-type"),
        HeaderName::from_static("authorization"),
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static("accept"),
        HeaderName::from_static("origin"),
        HeaderName::from_static("x-request-id"),
    ];
    if let Ok(identity) = HeaderName::from_bytes(identity_header.as_bytes()) {
        headers.push(identity);
    }

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers(headers)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}
