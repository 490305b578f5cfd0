// ABOUTME: Core domain types shared by the relay, metering, and persistence layers
// ABOUTME: Defines Credits (fixed 6-decimal money), ModelConfig, and UsageRecord
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Domain Models
//!
//! - [`Credits`]: prepaid balance amounts stored as micro-credits, so every
//!   price and cost is exact at the fixed 6-decimal precision of the ledger.
//! - [`ModelConfig`]: a resolved upstream model entry from the model registry.
//! - [`UsageRecord`]: prompt/completion/total unit counts used for billing.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::credit::{MICROS_PER_CREDIT, UNITS_PER_PRICE};
use crate::errors::AppError;

/// Numeric user identifier supplied by the identity provider
pub type UserId = i64;
/// Model registry key
pub type ModelId = i64;
/// Conversation identifier
pub type ConversationId = i64;
/// Identifier of a persisted conversation turn (the assistant message row)
pub type TurnId = i64;

// ============================================================================
// Credits
// ============================================================================

/// Credit amount in micro-credits (1 credit = 1 000 000 micro-credits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credits(i64);

impl Credits {
    /// Zero credits
    pub const ZERO: Self = Self(0);

    /// Build from a raw micro-credit count
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Raw micro-credit count
    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Whether the amount is exactly zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is below zero
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Cost of `units` at `price_per_1000` units, rounded up to the next micro-credit
    #[must_use]
    pub fn cost_of_units(price_per_1000: Self, units: u64) -> Self {
        let numerator = i128::from(price_per_1000.0) * i128::from(units);
        let divisor = i128::from(UNITS_PER_PRICE);
        // Ceiling division for non-negative prices; negative prices are rejected upstream
        let cost = (numerator + divisor - 1).div_euclid(divisor);
        Self(i64::try_from(cost).unwrap_or(i64::MAX))
    }
}

impl Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Credits {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MICROS_PER_CREDIT.unsigned_abs();
        write!(f, "{sign}{}.{:06}", abs / per, abs % per)
    }
}

impl FromStr for Credits {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = trimmed
            .strip_prefix('-')
            .map_or((false, trimmed), |rest| (true, rest));

        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(AppError::invalid_input(format!("Invalid credit amount '{s}'")));
        }
        if fraction.len() > 6 {
            return Err(AppError::invalid_input(format!(
                "Credit amount '{s}' exceeds 6 decimal places"
            )));
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(AppError::invalid_input(format!("Invalid credit amount '{s}'")));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AppError::invalid_input(format!("Invalid credit amount '{s}'")))?
        };
        let fraction_value: i64 = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<6}")
                .parse()
                .map_err(|_| AppError::invalid_input(format!("Invalid credit amount '{s}'")))?
        };

        let micros = whole_value
            .checked_mul(MICROS_PER_CREDIT)
            .and_then(|w| w.checked_add(fraction_value))
            .ok_or_else(|| AppError::invalid_input(format!("Credit amount '{s}' is too large")))?;

        Ok(Self(if negative { -micros } else { micros }))
    }
}

impl TryFrom<String> for Credits {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Credits> for String {
    fn from(value: Credits) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Model Configuration
// ============================================================================

/// Resolved upstream model entry
///
/// Owned by the model registry and read-only to the relay. One instance is
/// resolved per request and shared immutably for the rest of the exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Registry key
    pub id: ModelId,
    /// Provider tag used to pick the protocol adapter (e.g. `deepseek`, `ollama`)
    pub provider_tag: String,
    /// Model name sent upstream
    pub model_name: String,
    /// Full URL of the provider's chat endpoint
    pub api_endpoint: String,
    /// Bearer credential, empty for unauthenticated local servers
    pub credential: String,
    /// Price per 1000 units
    pub price_per_1000_units: Credits,
    /// Whether the model accepts requests
    pub enabled: bool,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("id", &self.id)
            .field("provider_tag", &self.provider_tag)
            .field("model_name", &self.model_name)
            .field("api_endpoint", &self.api_endpoint)
            .field("credential", &"<redacted>")
            .field("price_per_1000_units", &self.price_per_1000_units)
            .field("enabled", &self.enabled)
            .finish()
    }
}

// ============================================================================
// Usage
// ============================================================================

/// Token usage of one exchange, reported upstream or estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Units consumed by the prompt
    #[serde(rename = "promptTokens")]
    pub prompt_units: u32,
    /// Units produced by the completion
    #[serde(rename = "completionTokens")]
    pub completion_units: u32,
    /// Total billed units
    #[serde(rename = "totalTokens")]
    pub total_units: u32,
}

impl UsageRecord {
    /// Build a record whose total is the sum of its parts
    #[must_use]
    pub const fn new(prompt_units: u32, completion_units: u32) -> Self {
        Self {
            prompt_units,
            completion_units,
            total_units: prompt_units.saturating_add(completion_units),
        }
    }

    /// Build from optionally-missing upstream counts, computing a missing total
    #[must_use]
    pub fn from_parts(prompt: Option<u32>, completion: Option<u32>, total: Option<u32>) -> Self {
        let prompt_units = prompt.unwrap_or(0);
        let completion_units = completion.unwrap_or(0);
        let total_units = total
            .filter(|t| *t > 0)
            .unwrap_or_else(|| prompt_units.saturating_add(completion_units));
        Self {
            prompt_units,
            completion_units,
            total_units,
        }
    }

    /// Units to bill: never zero
    #[must_use]
    pub fn billable_units(&self) -> u64 {
        u64::from(self.total_units.max(1))
    }
}
