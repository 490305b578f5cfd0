// ABOUTME: HTTP server lifecycle for the chat relay
// ABOUTME: Binds the listener, serves the router, and drains in-flight requests on shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::constants::routes;
use crate::resources::ServerResources;
use crate::routes::build_router;

/// Chat relay HTTP server
pub struct RelayServer {
    resources: Arc<ServerResources>,
    config: ServerConfig,
}

impl RelayServer {
    /// Create a server over prepared resources
    #[must_use]
    pub fn new(resources: Arc<ServerResources>, config: ServerConfig) -> Self {
        Self { resources, config }
    }

    /// Serve until Ctrl-C or SIGTERM
    ///
    /// In-flight streams keep running to completion while the listener closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound or the server fails
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        let app = build_router(self.resources, &self.config);
        info!("Chat relay listening on http://{addr}");
        info!("   Completions: POST {}", routes::CHAT_COMPLETIONS);
        info!("   Titles:      POST {}", routes::CHAT_TITLES);
        info!("   Health:      GET  {}", routes::HEALTH);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("Chat relay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
