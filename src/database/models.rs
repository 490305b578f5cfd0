// ABOUTME: SQLite-backed model registry
// ABOUTME: Loads model configuration rows from ai_models for the resolver
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::{Credits, ModelConfig, ModelId};
use crate::resolver::ModelRegistry;

/// Model registry reading `ai_models`
#[derive(Clone)]
pub struct SqliteModelRegistry {
    pool: SqlitePool,
}

impl SqliteModelRegistry {
    /// Create a registry over a pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelRegistry for SqliteModelRegistry {
    async fn lookup(&self, model_id: ModelId) -> AppResult<Option<ModelConfig>> {
        let row = sqlx::query(
            r"
            SELECT id, provider_tag, model_name, api_endpoint, credential,
                   price_per_1000_micros, enabled
            FROM ai_models
            WHERE id = $1
            ",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load model {model_id}: {e}")))?;

        Ok(row.map(|r| ModelConfig {
            id: r.get("id"),
            provider_tag: r.get("provider_tag"),
            model_name: r.get("model_name"),
            api_endpoint: r.get("api_endpoint"),
            credential: r.get("credential"),
            price_per_1000_units: Credits::from_micros(r.get("price_per_1000_micros")),
            enabled: r.get("enabled"),
        }))
    }
}
