// ABOUTME: Shared server resources handed to every route handler
// ABOUTME: Wires the orchestrator, title generator, and identity provider from config and storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ServerConfig;
use crate::credit::CreditGuard;
use crate::database::Database;
use crate::identity::{IdentityProvider, TrustedHeaderIdentity};
use crate::llm::{ReqwestTransport, UpstreamTransport};
use crate::orchestrator::ChatOrchestrator;
use crate::recorder::ConversationRecorder;
use crate::resolver::ModelResolver;
use crate::titles::TitleGenerator;

/// Long-lived components shared across requests
#[derive(Clone)]
pub struct ServerResources {
    /// Chat turn coordinator
    pub orchestrator: ChatOrchestrator,
    /// Conversation title generator
    pub titles: TitleGenerator,
    /// Caller identity resolution
    pub identity: Arc<dyn IdentityProvider>,
}

impl ServerResources {
    /// Assemble resources from already-built components
    #[must_use]
    pub fn new(
        orchestrator: ChatOrchestrator,
        titles: TitleGenerator,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            orchestrator,
            titles,
            identity,
        }
    }

    /// Build production resources over a migrated database
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ServerConfig, database: &Database) -> Result<Self> {
        let transport: Arc<dyn UpstreamTransport> = Arc::new(
            ReqwestTransport::new(&config.upstream).context("Failed to build upstream client")?,
        );
        Ok(Self::with_transport(config, database, transport))
    }

    /// Build resources over a database with a caller-supplied transport
    #[must_use]
    pub fn with_transport(
        config: &ServerConfig,
        database: &Database,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Self {
        let resolver = ModelResolver::new(Arc::new(database.model_registry()));
        let credit = CreditGuard::new(Arc::new(database.credit_ledger()), config.credit);
        let recorder = ConversationRecorder::new(Arc::new(database.conversation_store()));

        let orchestrator = ChatOrchestrator::new(
            resolver,
            credit,
            recorder,
            Arc::clone(&transport),
            config.relay,
        );
        let titles = TitleGenerator::new(config.titles.clone(), transport);
        let identity = Arc::new(TrustedHeaderIdentity::new(config.identity_header.clone()));

        Self::new(orchestrator, titles, identity)
    }
}
