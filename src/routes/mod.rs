// ABOUTME: Route module organization for the chat relay HTTP endpoints
// ABOUTME: Assembles domain routers and the shared middleware stack into one axum router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the chat relay
//!
//! Each domain module holds route definitions and thin handlers that delegate
//! to the orchestrator or the title generator.

/// Chat completion and title routes
pub mod chat;
/// Health check routes
pub mod health;

pub use chat::{ChatRoutes, GenerateTitleRequest, GenerateTitleResponse};
pub use health::HealthRoutes;

use std::sync::Arc;

use axum::Router;
use http::HeaderName;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::middleware::{request_span, setup_cors, REQUEST_ID_HEADER};
use crate::resources::ServerResources;

/// Build the complete application router
#[must_use]
pub fn build_router(resources: Arc<ServerResources>, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ChatRoutes::routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(setup_cors(&config.cors, &config.identity_header)),
        )
}
