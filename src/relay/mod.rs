// ABOUTME: Streaming relay between an upstream provider stream and a client channel
// ABOUTME: Normalizes chunks in order, accumulates content and usage, and finalizes exactly once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Relay
//!
//! Each streamed exchange runs as one spawned task that owns the upstream byte
//! stream and the sending half of a bounded channel to the client:
//!
//! ```text
//! INIT --opened--> STREAMING --[DONE] / finishReason / EOF--> FINALIZING --> DONE
//!   |                  |  \--client gone------------------------^
//!   \--error-----------+--error / timeout--> FINALIZING --> FAILED
//! ```
//!
//! - Chunks reach the client in upstream order; unparseable chunks are logged
//!   and skipped.
//! - The bounded channel applies backpressure: a slow client slows the reads.
//! - A closed client channel is noticed while waiting on upstream, so a
//!   disconnect finalizes promptly with whatever content has accumulated.
//! - Finalization (debit, then record) is guarded by a [`FinalizeLatch`] and
//!   runs at most once. Every exchange that reached the relay is finalized,
//!   so a stream that fails or is cancelled before any content still bills
//!   its prompt and records an empty reply.

mod latch;

pub use latch::FinalizeLatch;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::RelayConfig;
use crate::errors::AppError;
use crate::finalize::{ExchangeContext, ExchangeFinalizer, FinalizeOutcome};
use crate::llm::{
    FinishReason, NormalizedChunk, ProtocolAdapter, SseEvent, SseLineBuffer, UpstreamRequest,
    UpstreamTransport,
};
use crate::models::UsageRecord;

/// Event delivered to the client channel
#[derive(Debug)]
pub enum RelayEvent {
    /// One normalized delta
    Chunk(NormalizedChunk),
    /// The exchange failed; no further events follow
    Failed(AppError),
    /// The exchange completed; no further events follow
    Done,
}

/// Lifecycle of one relayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Opening the upstream stream
    Init,
    /// Forwarding chunks
    Streaming,
    /// Billing and recording
    Finalizing,
    /// Closed normally (completed or client went away)
    Done,
    /// Closed after an upstream failure
    Failed,
}

/// Client-side handle to a running relay
pub struct RelayHandle {
    /// Ordered relay events; dropping the receiver cancels the exchange
    pub events: mpsc::Receiver<RelayEvent>,
    /// Current lifecycle state
    pub state: watch::Receiver<RelayState>,
    /// Relay task, yielding the finalization outcome when it ran
    pub task: JoinHandle<Option<FinalizeOutcome>>,
    latch: Arc<FinalizeLatch>,
}

impl RelayHandle {
    /// Whether finalization has started
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.latch.is_fired()
    }
}

/// Spawns relay tasks
#[derive(Clone)]
pub struct StreamRelay {
    transport: Arc<dyn UpstreamTransport>,
    finalizer: ExchangeFinalizer,
    config: RelayConfig,
}

impl StreamRelay {
    /// Create a relay
    #[must_use]
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        finalizer: ExchangeFinalizer,
        config: RelayConfig,
    ) -> Self {
        Self {
            transport,
            finalizer,
            config,
        }
    }

    /// Open the upstream stream in a new task and return the client handle immediately
    #[must_use]
    pub fn start(
        &self,
        adapter: ProtocolAdapter,
        context: ExchangeContext,
        request: UpstreamRequest,
    ) -> RelayHandle {
        let (tx, events) = mpsc::channel(self.config.channel_capacity.max(1));
        let (state_tx, state) = watch::channel(RelayState::Init);
        let latch = Arc::new(FinalizeLatch::new());

        let span = info_span!(
            "relay",
            user_id = context.user_id,
            conversation_id = context.conversation_id,
            model_id = context.model.id,
            adapter = adapter.name(),
        );
        let run = RelayRun {
            adapter,
            context,
            transport: Arc::clone(&self.transport),
            finalizer: self.finalizer.clone(),
            config: self.config,
            latch: Arc::clone(&latch),
            state: state_tx,
            accumulated: Accumulated::default(),
        };
        let task = tokio::spawn(run.run(tx, request).instrument(span));

        RelayHandle {
            events,
            state,
            task,
            latch,
        }
    }
}

/// How the pumping phase ended
enum Termination {
    Completed,
    ClientGone,
    Failed(AppError),
}

/// Result of forwarding one batch of events
enum Flow {
    Continue,
    Finished,
    ClientGone,
}

#[derive(Default)]
struct Accumulated {
    content: String,
    usage: Option<UsageRecord>,
    finish_reason: Option<FinishReason>,
    chunks: usize,
}

impl Accumulated {
    fn absorb(&mut self, chunk: &NormalizedChunk) {
        if let Some(delta) = &chunk.delta_content {
            self.content.push_str(delta);
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        self.chunks += 1;
    }
}

struct RelayRun {
    adapter: ProtocolAdapter,
    context: ExchangeContext,
    transport: Arc<dyn UpstreamTransport>,
    finalizer: ExchangeFinalizer,
    config: RelayConfig,
    latch: Arc<FinalizeLatch>,
    state: watch::Sender<RelayState>,
    accumulated: Accumulated,
}

impl RelayRun {
    async fn run(
        mut self,
        tx: mpsc::Sender<RelayEvent>,
        request: UpstreamRequest,
    ) -> Option<FinalizeOutcome> {
        let termination = self.pump(&tx, request).await;
        self.finish(&tx, termination).await
    }

    fn set_state(&self, next: RelayState) {
        let previous = self.state.send_replace(next);
        debug!(?previous, ?next, "Relay state change");
    }

    async fn pump(
        &mut self,
        tx: &mpsc::Sender<RelayEvent>,
        request: UpstreamRequest,
    ) -> Termination {
        let deadline = Instant::now() + self.config.stream_timeout;
        let provider = request.provider.clone();

        let opened = tokio::select! {
            () = tx.closed() => return Termination::ClientGone,
            () = sleep_until(deadline) => {
                return Termination::Failed(AppError::upstream_timeout(
                    &provider,
                    "stream did not open in time",
                ));
            }
            opened = self.transport.send_stream(request) => opened,
        };
        let mut upstream = match opened {
            Ok(upstream) => upstream,
            Err(e) => return Termination::Failed(e),
        };

        self.set_state(RelayState::Streaming);
        let mut lines = SseLineBuffer::new();

        loop {
            let read = tokio::select! {
                () = tx.closed() => return Termination::ClientGone,
                () = sleep_until(deadline) => {
                    return Termination::Failed(AppError::upstream_timeout(
                        &provider,
                        format!("stream exceeded {}s", self.config.stream_timeout.as_secs()),
                    ));
                }
                read = timeout(self.config.idle_timeout, upstream.next()) => read,
            };

            let events = match read {
                Err(_) => {
                    return Termination::Failed(AppError::upstream_timeout(
                        &provider,
                        format!("no data for {}s", self.config.idle_timeout.as_secs()),
                    ));
                }
                Ok(Some(Err(e))) => return Termination::Failed(e),
                Ok(Some(Ok(bytes))) => lines.feed(&bytes),
                Ok(None) => {
                    if lines.has_pending() {
                        debug!("Upstream closed mid-line, parsing the remainder");
                    }
                    return match self.forward(tx, lines.flush()).await {
                        Flow::ClientGone => Termination::ClientGone,
                        Flow::Continue | Flow::Finished => Termination::Completed,
                    };
                }
            };

            match self.forward(tx, events).await {
                Flow::Continue => {}
                Flow::Finished => return Termination::Completed,
                Flow::ClientGone => return Termination::ClientGone,
            }
        }
    }

    /// Forward one read's events in order
    ///
    /// A finish reason ends the stream after the rest of the same read is
    /// forwarded, so a trailing usage chunk in that read is kept.
    async fn forward(&mut self, tx: &mpsc::Sender<RelayEvent>, events: Vec<SseEvent>) -> Flow {
        let mut flow = Flow::Continue;
        for event in events {
            let payload = match event {
                SseEvent::Done => return Flow::Finished,
                SseEvent::Data(payload) => payload,
            };
            let chunk = match self.adapter.parse_chunk(&payload) {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Skipping unparseable chunk: {e}");
                    continue;
                }
            };

            if chunk.finish_reason.is_some() {
                flow = Flow::Finished;
            }
            // Only chunks the client channel accepted are billed and recorded
            if tx.send(RelayEvent::Chunk(chunk.clone())).await.is_err() {
                return Flow::ClientGone;
            }
            self.accumulated.absorb(&chunk);
        }
        flow
    }

    async fn finish(
        &self,
        tx: &mpsc::Sender<RelayEvent>,
        termination: Termination,
    ) -> Option<FinalizeOutcome> {
        if !self.latch.try_fire() {
            debug!("Relay already finalized");
            return None;
        }
        self.set_state(RelayState::Finalizing);

        if self.accumulated.content.is_empty() {
            debug!("Exchange ended before any content, billing the prompt only");
        }
        let outcome = self
            .finalizer
            .finalize(
                &self.context,
                &self.accumulated.content,
                self.accumulated.usage,
            )
            .await;

        match termination {
            Termination::Completed => {
                info!(
                    chunks = self.accumulated.chunks,
                    finish_reason = ?self.accumulated.finish_reason,
                    "Stream completed"
                );
                if tx.send(RelayEvent::Done).await.is_err() {
                    debug!("Client left before the final event");
                }
                self.set_state(RelayState::Done);
            }
            Termination::ClientGone => {
                info!(chunks = self.accumulated.chunks, "Client disconnected mid-stream");
                self.set_state(RelayState::Done);
            }
            Termination::Failed(e) => {
                error!(chunks = self.accumulated.chunks, "Stream failed: {e}");
                if tx.send(RelayEvent::Failed(e)).await.is_err() {
                    debug!("Client left before the error event");
                }
                self.set_state(RelayState::Failed);
            }
        }
        Some(outcome)
    }
}
