// ABOUTME: Line-buffering parser for upstream streaming bodies (SSE and newline-delimited JSON)
// ABOUTME: Handles partial lines and split UTF-8 sequences across network reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Line Parser
//!
//! Upstream providers stream in one of two framings:
//!
//! - **SSE**: `data: {...}` lines separated by blank lines, terminated by `data: [DONE]`
//! - **Newline-delimited JSON**: one bare `{...}` object per line (native chunk dialect)
//!
//! Network reads are not aligned with line boundaries. [`SseLineBuffer`] keeps
//! the trailing partial line (as raw bytes, so a multi-byte character split
//! between two reads is decoded intact) and emits one [`SseEvent`] per complete
//! payload line. Framing is decided here; payload interpretation belongs to the
//! protocol adapter.

use std::mem;

use crate::constants::relay::DONE_SENTINEL;

/// A parsed event from the upstream body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A JSON payload (`data:` prefix stripped, or a bare JSON line)
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Line-buffering parser that handles partial lines across read boundaries
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Bytes not yet terminated by a newline
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from one network read, returning every complete event
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the trailing partial line when the byte stream ends
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&remaining).into_iter().collect()
    }

    /// Whether a partial line is waiting for more bytes
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();

    // Blank lines separate SSE events; ':' starts a comment (keep-alive)
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    if let Some(data) = trimmed.strip_prefix("data:") {
        let payload = data.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_SENTINEL {
            return Some(SseEvent::Done);
        }
        return Some(SseEvent::Data(payload.to_owned()));
    }

    // Bare JSON line (newline-delimited framing)
    if trimmed.starts_with('{') {
        return Some(SseEvent::Data(trimmed.to_owned()));
    }

    if trimmed == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    // event:, id:, retry: and anything else carry no payload
    None
}
