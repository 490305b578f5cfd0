// ABOUTME: Chat relay server binary
// ABOUTME: Loads configuration, opens the database, and serves the relay API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Relay Server Binary
//!
//! Starts the unified chat completion relay with credit metering and
//! conversation recording.

use std::sync::Arc;

use anyhow::Result;
use chat_relay::{
    config::ServerConfig, database::Database, logging, resources::ServerResources,
    server::RelayServer,
};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chat-relay-server")]
#[command(about = "Chat completion relay with streaming, credit metering, and conversation recording")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    logging::init_from_env()?;
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;
    let resources = Arc::new(ServerResources::from_config(&config, &database)?);

    if let Err(e) = RelayServer::new(resources, config).run().await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}
