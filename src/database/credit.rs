// ABOUTME: SQLite-backed credit ledger with atomic conditional debits
// ABOUTME: Refuses any debit that would take a balance below zero and journals every charge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::credit::{CreditLedger, LedgerError};
use crate::errors::AppError;
use crate::models::{Credits, UserId};

impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(AppError::from(error))
    }
}

/// Credit ledger over `credit_accounts` and `credit_transactions`
#[derive(Clone)]
pub struct SqliteCreditLedger {
    pool: SqlitePool,
}

impl SqliteCreditLedger {
    /// Create a ledger over a pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for SqliteCreditLedger {
    async fn balance(&self, user_id: UserId) -> Result<Credits, LedgerError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance_micros FROM credit_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        balance
            .map(Credits::from_micros)
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: Credits,
        description: &str,
    ) -> Result<Credits, LedgerError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        // The balance guard and the decrement are one statement, so concurrent
        // debits cannot both pass the check.
        let remaining: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE credit_accounts
            SET balance_micros = balance_micros - $1, updated_at = $2
            WHERE user_id = $3 AND balance_micros >= $1
            RETURNING balance_micros
            ",
        )
        .bind(amount.micros())
        .bind(&now)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT balance_micros FROM credit_accounts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Err(balance.map_or(LedgerError::AccountNotFound(user_id), |balance| {
                LedgerError::Insufficient {
                    balance: Credits::from_micros(balance),
                    required: amount,
                }
            }));
        };

        sqlx::query(
            r"
            INSERT INTO credit_transactions (user_id, amount_micros, balance_after_micros, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user_id)
        .bind(-amount.micros())
        .bind(remaining)
        .bind(description)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id, %amount, "Debit committed");
        Ok(Credits::from_micros(remaining))
    }
}
