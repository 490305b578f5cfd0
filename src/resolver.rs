// ABOUTME: Model resolution: registry lookup, enablement check, and adapter selection
// ABOUTME: Maps provider tags to wire dialects through an extensible adapter registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::llm::ProtocolAdapter;
use crate::models::{ModelConfig, ModelId};

/// Source of model configuration
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Look up a model by id, `None` when it does not exist
    async fn lookup(&self, model_id: ModelId) -> AppResult<Option<ModelConfig>>;
}

/// Fixed set of models held in memory
#[derive(Debug, Default)]
pub struct StaticModelRegistry {
    models: HashMap<ModelId, ModelConfig>,
}

impl StaticModelRegistry {
    /// Build a registry from a list of models
    #[must_use]
    pub fn new(models: impl IntoIterator<Item = ModelConfig>) -> Self {
        Self {
            models: models.into_iter().map(|model| (model.id, model)).collect(),
        }
    }
}

#[async_trait]
impl ModelRegistry for StaticModelRegistry {
    async fn lookup(&self, model_id: ModelId) -> AppResult<Option<ModelConfig>> {
        Ok(self.models.get(&model_id).cloned())
    }
}

/// Provider tag to dialect mapping
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, ProtocolAdapter>,
    fallback: ProtocolAdapter,
}

impl AdapterRegistry {
    /// Empty registry answering `fallback` for every tag
    #[must_use]
    pub fn new(fallback: ProtocolAdapter) -> Self {
        Self {
            adapters: HashMap::new(),
            fallback,
        }
    }

    /// Register (or replace) the dialect of a provider tag
    #[must_use]
    pub fn with(mut self, provider_tag: &str, adapter: ProtocolAdapter) -> Self {
        self.adapters
            .insert(provider_tag.trim().to_ascii_lowercase(), adapter);
        self
    }

    /// Dialect of a provider tag; unknown tags get the fallback
    #[must_use]
    pub fn adapter_for(&self, provider_tag: &str) -> ProtocolAdapter {
        self.adapters
            .get(&provider_tag.trim().to_ascii_lowercase())
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(ProtocolAdapter::OpenAiCompatible)
            .with("deepseek", ProtocolAdapter::OpenAiCompatible)
            .with("openai", ProtocolAdapter::OpenAiCompatible)
            .with("vllm", ProtocolAdapter::OpenAiCompatible)
            .with("ollama", ProtocolAdapter::NativeChunkFormat)
    }
}

/// Resolves a model id into an enabled configuration and its adapter
#[derive(Clone)]
pub struct ModelResolver {
    registry: Arc<dyn ModelRegistry>,
    adapters: AdapterRegistry,
}

impl ModelResolver {
    /// Create a resolver with the default adapter registry
    #[must_use]
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self::with_adapters(registry, AdapterRegistry::default())
    }

    /// Create a resolver with a custom adapter registry
    #[must_use]
    pub fn with_adapters(registry: Arc<dyn ModelRegistry>, adapters: AdapterRegistry) -> Self {
        Self { registry, adapters }
    }

    /// Resolve an enabled model
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` for unknown ids, `ModelDisabled` for disabled
    /// models, and the registry's error when the lookup fails.
    pub async fn resolve(&self, model_id: ModelId) -> AppResult<ModelConfig> {
        let model = self
            .registry
            .lookup(model_id)
            .await?
            .ok_or_else(|| AppError::model_not_found(model_id))?;
        if !model.enabled {
            return Err(AppError::model_disabled(model_id));
        }
        debug!(
            model_id,
            provider = %model.provider_tag,
            model = %model.model_name,
            "Resolved model"
        );
        Ok(model)
    }

    /// Adapter for a resolved model
    #[must_use]
    pub fn adapter_for(&self, model: &ModelConfig) -> ProtocolAdapter {
        self.adapters.adapter_for(&model.provider_tag)
    }
}
