// ABOUTME: Axum response conversion for AppError
// ABOUTME: Maps error codes to HTTP status codes and structured JSON bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use tracing::{error, warn};

use super::{AppError, ErrorResponse};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(code = ?self.code, "Request failed: {}", self.message);
        } else {
            warn!(code = ?self.code, "Request rejected: {}", self.message);
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
