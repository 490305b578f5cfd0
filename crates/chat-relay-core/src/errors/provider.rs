// ABOUTME: Conversion from reqwest errors into upstream AppError codes
// ABOUTME: Distinguishes timeouts from other transport failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::AppError;

impl AppError {
    /// Classify a reqwest failure against the named provider
    ///
    /// Timeouts become `UpstreamTimeout`, everything else `UpstreamTransport`.
    #[must_use]
    pub fn from_reqwest(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::upstream_timeout(provider, format!("request timed out: {error}"))
                .with_source(error)
        } else if error.is_connect() {
            Self::upstream_transport(provider, format!("cannot connect: {error}"))
                .with_source(error)
        } else {
            Self::upstream_transport(provider, error.to_string()).with_source(error)
        }
    }
}
