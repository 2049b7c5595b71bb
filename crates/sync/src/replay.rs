// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay engine.
//!
//! A replay cycle walks a snapshot of the queue in order, one item at a
//! time, and dispatches each to the remote sink:
//!
//! ```text
//!   Idle ──(online ∧ queue non-empty ∧ flag claimed)──► Running ──► Idle
//!                                                          │
//!                          per item: delay → dispatch → applied | retained
//! ```
//!
//! A failed item never aborts the cycle. It is retained verbatim and the
//! remaining items are still attempted. At most one cycle runs at a time;
//! [`SyncFlag`] is the reentrancy guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use rq_core::{Mutation, QueueItem};

use crate::sink::{RemoteSink, SinkError, SinkFuture, SinkResult};

/// Why a replay request did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote store is unreachable.
    Offline,
    /// Nothing is queued.
    Empty,
    /// Another cycle is in flight.
    AlreadyRunning,
}

/// Counts for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Items in the snapshot.
    pub attempted: usize,
    /// Items the sink accepted (now removed from the queue).
    pub applied: usize,
    /// Items the sink refused (kept for the next cycle).
    pub retained: usize,
}

/// Result of a replay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Skipped(SkipReason),
    Completed(ReplayReport),
}

impl ReplayOutcome {
    /// Number of items applied, zero if skipped.
    pub fn applied(&self) -> usize {
        match self {
            ReplayOutcome::Completed(report) => report.applied,
            ReplayOutcome::Skipped(_) => 0,
        }
    }
}

/// Reentrancy guard: set while a cycle runs.
#[derive(Debug, Default)]
pub struct SyncFlag(AtomicBool);

impl SyncFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag. Returns `None` if a cycle is already running.
    pub fn try_claim(&self) -> Option<SyncClaim<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncClaim(&self.0))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds the [`SyncFlag`] until dropped.
#[derive(Debug)]
pub struct SyncClaim<'a>(&'a AtomicBool);

impl Drop for SyncClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outcome of running the engine over one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleResult {
    /// Successfully dispatched items.
    pub applied: usize,
    /// Failed items, in their original relative order.
    pub retained: Vec<QueueItem>,
}

impl CycleResult {
    pub fn report(&self, attempted: usize) -> ReplayReport {
        ReplayReport {
            attempted,
            applied: self.applied,
            retained: self.retained.len(),
        }
    }
}

/// Dispatches queued mutations to a remote sink.
#[derive(Clone)]
pub struct ReplayEngine {
    sink: Arc<dyn RemoteSink>,
    /// Pause before each dispatch, to avoid tripping remote rate limits.
    delay: Duration,
    timeout: Option<Duration>,
}

impl ReplayEngine {
    pub fn new(sink: Arc<dyn RemoteSink>, delay: Duration, timeout: Option<Duration>) -> Self {
        ReplayEngine {
            sink,
            delay,
            timeout,
        }
    }

    /// Applies one item to the sink, bounded by the dispatch timeout if set.
    pub async fn dispatch(&self, item: &QueueItem) -> SinkResult<()> {
        let call = send(self.sink.as_ref(), item);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(SinkError::Timeout)),
            None => call.await,
        }
    }

    /// Runs one cycle over `snapshot`, sequentially and in order.
    pub async fn run(&self, snapshot: &[QueueItem]) -> CycleResult {
        let mut result = CycleResult::default();

        for item in snapshot {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.dispatch(item).await {
                Ok(()) => {
                    debug!(item = %item.id, table = %item.table, kind = %item.kind(), "applied");
                    result.applied += 1;
                }
                Err(e) => {
                    error!(
                        item = %item.id,
                        table = %item.table,
                        kind = %item.kind(),
                        error = %e,
                        "sync failed for item"
                    );
                    result.retained.push(item.clone());
                }
            }
        }

        result
    }
}

fn send<'a>(sink: &'a dyn RemoteSink, item: &'a QueueItem) -> SinkFuture<'a> {
    match &item.mutation {
        Mutation::Insert { row } => sink.insert(&item.table, row),
        Mutation::Update { id, changes } => sink.update(&item.table, id, changes),
        Mutation::Delete { id } => sink.delete(&item.table, id),
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
