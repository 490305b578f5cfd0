// ABOUTME: SQLite persistence for model configuration, credit accounts, and conversations
// ABOUTME: Owns the connection pool and schema, and hands out the relay's storage adapters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Database Management
//!
//! One `SQLite` pool backs every storage seam of the relay:
//!
//! - [`SqliteModelRegistry`] reads `ai_models`
//! - [`SqliteCreditLedger`] debits `credit_accounts` and journals `credit_transactions`
//! - [`SqliteConversationStore`] appends to `messages` and touches `conversations`
//!
//! Amounts are stored as integer micro-credits.

mod chat;
mod credit;
mod models;

pub use chat::{MessageRow, SqliteConversationStore};
pub use credit::SqliteCreditLedger;
pub use models::SqliteModelRegistry;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::{ConversationId, Credits, ModelConfig, UserId};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 5;

/// Database manager for relay storage
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) and migrate the database
    ///
    /// An in-memory URL gets a single long-lived connection, since each
    /// `SQLite` memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or a
    /// migration fails
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL '{database_url}'"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let in_memory = database_url.contains(":memory:");
        if !in_memory {
            if let Some(dir) = options
                .get_filename()
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
            {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create database directory {}", dir.display())
                })?;
            }
        }

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Model registry over `ai_models`
    #[must_use]
    pub fn model_registry(&self) -> SqliteModelRegistry {
        SqliteModelRegistry::new(self.pool.clone())
    }

    /// Credit ledger over `credit_accounts`
    #[must_use]
    pub fn credit_ledger(&self) -> SqliteCreditLedger {
        SqliteCreditLedger::new(self.pool.clone())
    }

    /// Conversation store over `conversations` and `messages`
    #[must_use]
    pub fn conversation_store(&self) -> SqliteConversationStore {
        SqliteConversationStore::new(self.pool.clone())
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_models().await?;
        self.migrate_credit().await?;
        self.migrate_conversations().await?;
        Ok(())
    }

    async fn migrate_models(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ai_models (
                id INTEGER PRIMARY KEY,
                provider_tag TEXT NOT NULL,
                model_name TEXT NOT NULL,
                api_endpoint TEXT NOT NULL,
                credential TEXT NOT NULL DEFAULT '',
                price_per_1000_micros INTEGER NOT NULL DEFAULT 0 CHECK (price_per_1000_micros >= 0),
                enabled BOOLEAN NOT NULL DEFAULT true,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_credit(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS credit_accounts (
                user_id INTEGER PRIMARY KEY,
                balance_micros INTEGER NOT NULL CHECK (balance_micros >= 0),
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS credit_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES credit_accounts(user_id),
                amount_micros INTEGER NOT NULL,
                balance_after_micros INTEGER NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_credit_transactions_user ON credit_transactions(user_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_conversations(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                model_id INTEGER,
                title TEXT NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT false,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                model_id INTEGER,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tokens_consumed INTEGER NOT NULL DEFAULT 0,
                cost_micros INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Provisioning
    // ========================================================================

    /// Insert or replace a model configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_model(&self, model: &ModelConfig) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO ai_models (id, provider_tag, model_name, api_endpoint, credential,
                                   price_per_1000_micros, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT(id) DO UPDATE SET
                provider_tag = excluded.provider_tag,
                model_name = excluded.model_name,
                api_endpoint = excluded.api_endpoint,
                credential = excluded.credential,
                price_per_1000_micros = excluded.price_per_1000_micros,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            ",
        )
        .bind(model.id)
        .bind(&model.provider_tag)
        .bind(&model.model_name)
        .bind(&model.api_endpoint)
        .bind(&model.credential)
        .bind(model.price_per_1000_units.micros())
        .bind(model.enabled)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save model {}: {e}", model.id)))?;
        Ok(())
    }

    /// Create or reset a user's credit account
    ///
    /// # Errors
    ///
    /// Returns an error for a negative balance or a failed write
    pub async fn create_credit_account(&self, user_id: UserId, balance: Credits) -> AppResult<()> {
        if balance.is_negative() {
            return Err(AppError::invalid_input("Credit balance cannot be negative"));
        }
        sqlx::query(
            r"
            INSERT INTO credit_accounts (user_id, balance_micros, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(user_id) DO UPDATE SET
                balance_micros = excluded.balance_micros,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id)
        .bind(balance.micros())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save credit account: {e}")))?;
        Ok(())
    }

    /// Create a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_conversation(
        &self,
        user_id: UserId,
        title: &str,
    ) -> AppResult<ConversationId> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(
            r"
            INSERT INTO conversations (user_id, title, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(title)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;
        Ok(row.get("id"))
    }

    /// Soft-delete a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_conversation(&self, conversation_id: ConversationId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET is_deleted = true, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}
