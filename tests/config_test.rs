// ABOUTME: Tests for environment-driven server and logging configuration
// ABOUTME: Covers defaults, overrides, rejected values, and file-backed database creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;
use std::time::Duration;

use chat_relay::config::ServerConfig;
use chat_relay::credit::CreditLedger;
use chat_relay::database::Database;
use chat_relay::logging::{LogFormat, LoggingConfig};
use chat_relay::models::Credits;
use serial_test::serial;

const SERVER_VARS: &[&str] = &[
    "HTTP_PORT",
    "DATABASE_URL",
    "UPSTREAM_CONNECT_TIMEOUT_SECS",
    "UPSTREAM_REQUEST_TIMEOUT_SECS",
    "UPSTREAM_STREAM_TIMEOUT_SECS",
    "UPSTREAM_STREAM_IDLE_TIMEOUT_SECS",
    "RELAY_CHANNEL_CAPACITY",
    "CREDIT_MIN_VIABLE_UNITS",
    "TITLE_API_KEY",
    "TITLE_BASE_URL",
    "TITLE_MODEL",
    "CORS_ALLOWED_ORIGINS",
    "IDENTITY_HEADER",
];

fn clear_server_env() {
    for var in SERVER_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_server_env();

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.http_port, 8081);
    assert_eq!(config.relay.channel_capacity, 32);
    assert_eq!(config.upstream.request_timeout, Duration::from_secs(30));
    assert_eq!(config.relay.idle_timeout, Duration::from_secs(60));
    assert_eq!(config.credit.min_viable_units, 100);
    assert_eq!(config.identity_header, "x-user-id");
    assert_eq!(config.cors.allowed_origins, vec!["*"]);
    assert!(config.titles.api_key.is_none());
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_server_env();
    env::set_var("HTTP_PORT", "9090");
    env::set_var("UPSTREAM_STREAM_IDLE_TIMEOUT_SECS", "5");
    env::set_var("RELAY_CHANNEL_CAPACITY", "4");
    env::set_var("CREDIT_MIN_VIABLE_UNITS", "250");
    env::set_var("TITLE_API_KEY", "secret-key");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://a.test, https://b.test");
    env::set_var("IDENTITY_HEADER", "X-Account-Id");

    let config = ServerConfig::from_env().unwrap();
    clear_server_env();

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.upstream.stream_idle_timeout, Duration::from_secs(5));
    assert_eq!(config.relay.idle_timeout, Duration::from_secs(5));
    assert_eq!(config.relay.channel_capacity, 4);
    assert_eq!(config.credit.min_viable_units, 250);
    assert_eq!(config.titles.api_key.as_deref(), Some("secret-key"));
    assert_eq!(
        config.cors.allowed_origins,
        vec!["https://a.test", "https://b.test"]
    );
    assert_eq!(config.identity_header, "x-account-id");

    let summary = config.summary();
    assert!(summary.contains("9090"));
    assert!(!summary.contains("secret-key"));
    assert!(!format!("{:?}", config.titles).contains("secret-key"));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_server_env();

    env::set_var("HTTP_PORT", "not-a-port");
    let error = ServerConfig::from_env().unwrap_err();
    assert!(error.to_string().contains("HTTP_PORT"));
    env::remove_var("HTTP_PORT");

    env::set_var("RELAY_CHANNEL_CAPACITY", "0");
    assert!(ServerConfig::from_env().is_err());
    env::remove_var("RELAY_CHANNEL_CAPACITY");

    env::set_var("TITLE_BASE_URL", "not a url");
    assert!(ServerConfig::from_env().is_err());
    clear_server_env();
}

#[test]
#[serial]
fn test_logging_config_from_environment() {
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("ENVIRONMENT", "production");

    let config = LoggingConfig::from_env();
    env::remove_var("LOG_FORMAT");
    env::remove_var("ENVIRONMENT");

    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_location);
    assert!(config.include_spans);
    assert_eq!(LogFormat::from_name("compact"), LogFormat::Compact);
    assert_eq!(LogFormat::from_name("unknown"), LogFormat::Pretty);
}

#[tokio::test]
async fn test_file_database_is_created_with_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("relay.db");
    let url = format!("sqlite:{}", path.display());

    let database = Database::new(&url).await.unwrap();
    database
        .create_credit_account(1, Credits::from_micros(500))
        .await
        .unwrap();

    assert!(path.exists());
    assert_eq!(
        database.credit_ledger().balance(1).await.unwrap(),
        Credits::from_micros(500)
    );
}
