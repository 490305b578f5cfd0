// ABOUTME: Caller identity resolution for relay requests
// ABOUTME: Trusts a user id header set by an authenticating gateway in front of the relay
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::HeaderMap;

use crate::errors::{AppError, AppResult};
use crate::models::UserId;

/// Resolves the authenticated user of a request
pub trait IdentityProvider: Send + Sync {
    /// Authenticated user id
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when the request carries no usable identity.
    fn user_id(&self, headers: &HeaderMap) -> AppResult<UserId>;
}

/// Reads the user id from a header injected by a trusted gateway
#[derive(Debug, Clone)]
pub struct TrustedHeaderIdentity {
    header: String,
}

impl TrustedHeaderIdentity {
    /// Trust the given header name
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }
}

impl IdentityProvider for TrustedHeaderIdentity {
    fn user_id(&self, headers: &HeaderMap) -> AppResult<UserId> {
        let raw = headers
            .get(self.header.as_str())
            .ok_or_else(|| AppError::auth_required(format!("Missing {} header", self.header)))?;

        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<UserId>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::auth_required(format!("Invalid {} header", self.header)))
    }
}
