// ABOUTME: Health check route handlers for service monitoring
// ABOUTME: Liveness endpoint for load balancers and orchestration probes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::constants::{routes, service_names};

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create health check routes
    pub fn routes() -> Router {
        Router::new().route(routes::HEALTH, get(Self::health))
    }

    async fn health() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": service_names::CHAT_RELAY_SERVER,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}
