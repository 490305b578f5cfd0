// ABOUTME: Credit metering: pre-call affordability check and post-call debit
// ABOUTME: Defines the CreditLedger seam, an in-memory ledger, and the CreditGuard policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Credit Guard
//!
//! Two checkpoints protect the prepaid balance:
//!
//! 1. **Pre-check**: before any provider call, the balance must cover the cost
//!    of a minimum viable exchange (`min_viable_units` at the model's price).
//! 2. **Debit**: after the exchange, the actual cost
//!    `ceil(price * max(total_units, 1) / 1000)` is deducted atomically. The
//!    ledger refuses any debit that would take a balance below zero.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CreditPolicy;
use crate::errors::{AppError, AppResult};
use crate::models::{Credits, ModelConfig, UsageRecord, UserId};

/// Ledger failure
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Balance cannot cover the debit
    #[error("insufficient credit: balance {balance}, required {required}")]
    Insufficient {
        /// Current balance
        balance: Credits,
        /// Amount that was requested
        required: Credits,
    },
    /// No credit account exists for the user
    #[error("no credit account for user {0}")]
    AccountNotFound(UserId),
    /// Backing store failed
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Insufficient { .. } | LedgerError::AccountNotFound(_) => {
                Self::insufficient_credit(error.to_string())
            }
            LedgerError::Storage(inner) => inner,
        }
    }
}

/// Prepaid credit ledger
///
/// Implementations must serialize concurrent debits per account so the
/// balance never goes negative.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance of a user
    async fn balance(&self, user_id: UserId) -> Result<Credits, LedgerError>;

    /// Atomically deduct `amount`, returning the new balance
    async fn debit(
        &self,
        user_id: UserId,
        amount: Credits,
        description: &str,
    ) -> Result<Credits, LedgerError>;
}

/// In-memory ledger, one `DashMap` shard lock per account during a debit
#[derive(Debug, Default)]
pub struct MemoryCreditLedger {
    accounts: DashMap<UserId, Credits>,
}

impl MemoryCreditLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's balance, creating the account if needed
    pub fn set_balance(&self, user_id: UserId, balance: Credits) {
        self.accounts.insert(user_id, balance);
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn balance(&self, user_id: UserId) -> Result<Credits, LedgerError> {
        self.accounts
            .get(&user_id)
            .map(|entry| *entry)
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: Credits,
        description: &str,
    ) -> Result<Credits, LedgerError> {
        let mut entry = self
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::AccountNotFound(user_id))?;
        let balance = *entry;
        if balance < amount {
            return Err(LedgerError::Insufficient {
                balance,
                required: amount,
            });
        }
        *entry = balance - amount;
        debug!(user_id, %amount, description, "Debited credit");
        Ok(*entry)
    }
}

/// Applies the credit policy around an exchange
#[derive(Clone)]
pub struct CreditGuard {
    ledger: Arc<dyn CreditLedger>,
    policy: CreditPolicy,
}

impl CreditGuard {
    /// Create a guard over a ledger
    #[must_use]
    pub fn new(ledger: Arc<dyn CreditLedger>, policy: CreditPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Minimum balance required before calling `model`
    #[must_use]
    pub fn minimum_balance(&self, model: &ModelConfig) -> Credits {
        Credits::cost_of_units(model.price_per_1000_units, self.policy.min_viable_units)
    }

    /// Cost of an exchange with the given usage
    #[must_use]
    pub fn cost_of(usage: &UsageRecord, model: &ModelConfig) -> Credits {
        Credits::cost_of_units(model.price_per_1000_units, usage.billable_units())
    }

    /// Reject the request when the balance cannot cover a minimum viable exchange
    ///
    /// Free models always pass.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCredit` when the balance is below the minimum or
    /// the user has no account, and the storage error when the ledger fails.
    pub async fn pre_check(&self, user_id: UserId, model: &ModelConfig) -> AppResult<()> {
        let required = self.minimum_balance(model);
        if required.is_zero() {
            return Ok(());
        }
        let balance = self.ledger.balance(user_id).await?;
        if balance < required {
            warn!(user_id, model_id = model.id, %balance, %required, "Credit pre-check failed");
            return Err(AppError::insufficient_credit(format!(
                "Balance {balance} is below the {required} required for model {}",
                model.id
            )));
        }
        Ok(())
    }

    /// Deduct the cost of a finished exchange, returning the amount charged
    ///
    /// Free models skip the ledger entirely.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCredit` when the balance no longer covers the cost,
    /// or the storage error when the ledger fails. No partial debit is made.
    pub async fn debit(
        &self,
        user_id: UserId,
        usage: &UsageRecord,
        model: &ModelConfig,
    ) -> AppResult<Credits> {
        let cost = Self::cost_of(usage, model);
        if cost.is_zero() {
            return Ok(Credits::ZERO);
        }

        let description = format!(
            "Chat with {} ({} units)",
            model.model_name, usage.total_units
        );
        let balance = self.ledger.debit(user_id, cost, &description).await?;
        info!(user_id, model_id = model.id, %cost, %balance, "Exchange billed");
        Ok(cost)
    }
}
