// ABOUTME: One-shot latch guarding exchange finalization
// ABOUTME: Exactly one caller wins, however completion, cancellation, and failure race
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicBool, Ordering};

/// Fires at most once
#[derive(Debug, Default)]
pub struct FinalizeLatch {
    fired: AtomicBool,
}

impl FinalizeLatch {
    /// Create an unfired latch
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }

    /// Claim the latch; `true` only for the first caller
    pub fn try_fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the latch has been claimed
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
