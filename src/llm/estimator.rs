// ABOUTME: Fallback usage estimation for providers that omit token counts
// ABOUTME: Approximates units as ceil(characters * 0.75) per message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::ChatMessage;
use crate::models::UsageRecord;

/// Character-ratio usage estimator
///
/// Never bills zero for a non-empty exchange: when both counts round to
/// nothing, one completion unit is assumed.
pub struct UsageEstimator;

impl UsageEstimator {
    /// Estimated units for a piece of text: `ceil(chars * 0.75)`
    #[must_use]
    pub fn estimate_text(text: &str) -> u32 {
        let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
        let units = chars.saturating_mul(3).saturating_add(3) / 4;
        u32::try_from(units).unwrap_or(u32::MAX)
    }

    /// Estimate usage for a prompt and the accumulated completion text
    #[must_use]
    pub fn estimate(messages: &[ChatMessage], completion: &str) -> UsageRecord {
        let prompt_units = messages
            .iter()
            .map(|message| Self::estimate_text(&message.content))
            .fold(0_u32, u32::saturating_add);
        let mut completion_units = Self::estimate_text(completion);

        if prompt_units == 0 && completion_units == 0 {
            completion_units = 1;
        }

        UsageRecord::new(prompt_units, completion_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_text_rounds_up() {
        assert_eq!(UsageEstimator::estimate_text(""), 0);
        assert_eq!(UsageEstimator::estimate_text("a"), 1);
        assert_eq!(UsageEstimator::estimate_text("Hi"), 2);
        assert_eq!(UsageEstimator::estimate_text("abcd"), 3);
        assert_eq!(UsageEstimator::estimate_text("Hello!"), 5);
        // Counted in characters, not bytes
        assert_eq!(UsageEstimator::estimate_text("\u{4f60}\u{597d}"), 2);
    }

    #[test]
    fn test_estimate_is_never_zero() {
        let usage = UsageEstimator::estimate(&[], "");
        assert_eq!(usage.total_units, 1);

        let usage = UsageEstimator::estimate(&[ChatMessage::user("Hi")], "Hello!");
        assert_eq!(usage, UsageRecord::new(2, 5));
    }
}
