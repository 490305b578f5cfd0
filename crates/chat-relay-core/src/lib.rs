// ABOUTME: Core types and constants for the chat relay server
// ABOUTME: Foundation crate with error handling and shared constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Chat Relay Core
//!
//! Foundation crate for the chat relay. It changes rarely, which keeps the main
//! crate's incremental builds fast.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Defaults for ports, timeouts, metering, and title generation

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
