// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync service handle.
//!
//! [`SyncService`] is built once at startup and cloned into whatever needs
//! it. It owns the in-memory view of the queue, keeps it mirrored into the
//! durable store, and runs replay cycles. [`SyncService::start`] spawns the
//! background worker that replays on every transition to online and after
//! every enqueue.
//!
//! Callers never see errors from this layer: persistence and remote failures
//! are logged, and the only observable effect of a failure is that the item
//! stays queued.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rq_core::{KeyValueStore, NewMutation, QueueItem};

use crate::config::{Config, ConfigResult};
use crate::connectivity::ConnectivityMonitor;
use crate::replay::{ReplayEngine, ReplayOutcome, SkipReason, SyncFlag};
use crate::sink::RemoteSink;
use crate::store::QueueStore;

/// Notification broadcast to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A cycle applied `applied` items. Observers should re-fetch.
    Synced { applied: usize },
}

/// Coarse state for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Unreachable, with `pending` changes waiting.
    Offline { pending: usize },
    /// A cycle is running over the queue.
    Syncing { pending: usize },
    /// Reachable with work queued but no cycle running.
    Pending { pending: usize },
    /// Reachable and nothing queued.
    Idle,
}

/// Handle to the offline queue and its replay machinery.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

struct Inner {
    monitor: ConnectivityMonitor,
    store: QueueStore,
    /// In-memory view of the queue; always what was last persisted, or newer
    /// if a persist failed.
    queue: Mutex<Vec<QueueItem>>,
    engine: ReplayEngine,
    syncing: SyncFlag,
    events: broadcast::Sender<SyncEvent>,
    /// Wakes the worker after an enqueue.
    kick: Notify,
}

impl SyncService {
    /// Creates the service, loading any queue left from a previous run.
    pub fn new(
        config: &Config,
        store: impl KeyValueStore + 'static,
        sink: impl RemoteSink + 'static,
        monitor: ConnectivityMonitor,
    ) -> Self {
        let store = QueueStore::new(store, config.queue_key.clone());
        let queue = store.load();
        if !queue.is_empty() {
            info!(pending = queue.len(), "restored offline queue");
        }

        let engine = ReplayEngine::new(
            Arc::new(sink),
            config.replay_delay(),
            config.dispatch_timeout(),
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        SyncService {
            inner: Arc::new(Inner {
                monitor,
                store,
                queue: Mutex::new(queue),
                engine,
                syncing: SyncFlag::new(),
                events,
                kick: Notify::new(),
            }),
        }
    }

    /// Creates the service with the storage backend named in `config`.
    pub fn from_config(
        config: &Config,
        sink: impl RemoteSink + 'static,
        monitor: ConnectivityMonitor,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let store = config.open_store()?;
        Ok(Self::new(config, store, sink, monitor))
    }

    /// The connectivity monitor this service follows.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn is_online(&self) -> bool {
        self.inner.monitor.is_online()
    }

    /// True while a replay cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.is_set()
    }

    /// Snapshot of the queue, oldest first.
    pub async fn queue(&self) -> Vec<QueueItem> {
        self.inner.queue.lock().await.clone()
    }

    /// Number of queued items.
    pub async fn pending(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Current indicator state.
    pub async fn status(&self) -> SyncStatus {
        let pending = self.pending().await;
        if !self.is_online() {
            SyncStatus::Offline { pending }
        } else if self.is_syncing() {
            SyncStatus::Syncing { pending }
        } else if pending > 0 {
            SyncStatus::Pending { pending }
        } else {
            SyncStatus::Idle
        }
    }

    /// Subscribes to sync notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Queues a mutation and persists the queue.
    ///
    /// The returned item carries the id and timestamp it was stamped with.
    /// If persisting fails the item is still queued in memory and will be
    /// written with the next successful save.
    pub async fn add_to_queue(&self, mutation: NewMutation) -> QueueItem {
        let item = QueueItem::stamp(mutation);
        {
            let mut queue = self.inner.queue.lock().await;
            queue.push(item.clone());
            if let Err(e) = self.inner.store.save(&queue) {
                error!(item = %item.id, error = %e, "failed to persist offline queue");
            }
            debug!(item = %item.id, table = %item.table, kind = %item.kind(), pending = queue.len(), "queued");
        }
        self.inner.kick.notify_one();
        item
    }

    /// Runs one replay cycle if online, non-empty, and not already running.
    pub async fn process_queue(&self) -> ReplayOutcome {
        let inner = &self.inner;

        if !inner.monitor.is_online() {
            debug!("replay skipped: offline");
            return ReplayOutcome::Skipped(SkipReason::Offline);
        }
        let Some(claim) = inner.syncing.try_claim() else {
            debug!("replay skipped: already running");
            return ReplayOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        let snapshot = inner.queue.lock().await.clone();
        if snapshot.is_empty() {
            return ReplayOutcome::Skipped(SkipReason::Empty);
        }

        info!("starting sync of {} items", snapshot.len());
        let cycle = inner.engine.run(&snapshot).await;
        let report = cycle.report(snapshot.len());

        // Only this cycle replaces the queue, so everything past the
        // snapshot was appended while it ran.
        let appended = {
            let mut queue = inner.queue.lock().await;
            let cut = snapshot.len().min(queue.len());
            let appended = queue.split_off(cut);
            let count = appended.len();

            let mut next = cycle.retained;
            next.extend(appended);
            if let Err(e) = inner.store.save(&next) {
                error!(error = %e, "failed to persist offline queue after sync");
            }
            *queue = next;
            count
        };
        drop(claim);

        if report.retained > 0 {
            warn!(retained = report.retained, "items left in offline queue");
        }
        if report.applied > 0 {
            info!("synced {} items successfully", report.applied);
            let _ = inner.events.send(SyncEvent::Synced {
                applied: report.applied,
            });
        }
        if appended > 0 {
            // Not part of this snapshot; give them a cycle of their own.
            inner.kick.notify_one();
        }

        ReplayOutcome::Completed(report)
    }

    /// Spawns the background worker.
    ///
    /// The worker replays once at startup if online, then on every transition
    /// to online and after every enqueue. Must be called within a tokio
    /// runtime.
    pub fn start(&self) -> SyncWorker {
        let service = self.clone();
        let mut connectivity = self.inner.monitor.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            if service.is_online() {
                service.process_queue().await;
            }

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = connectivity.changed() => match changed {
                        Some(true) => {
                            let pending = service.pending().await;
                            info!(pending, "back online");
                            service.process_queue().await;
                        }
                        Some(false) => {}
                        None => break,
                    },
                    _ = service.inner.kick.notified() => {
                        if service.is_online() {
                            service.process_queue().await;
                        }
                    }
                }
            }
            debug!("sync worker stopped");
        });

        SyncWorker {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle to the background worker spawned by [`SyncService::start`].
///
/// Dropping it also stops the worker, once any in-flight cycle completes.
pub struct SyncWorker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncWorker {
    /// Stops the worker and waits for it to exit.
    ///
    /// A cycle in progress runs to completion first.
    pub async fn shutdown(self) {
        let SyncWorker { shutdown, handle } = self;
        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "sync worker ended abnormally");
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
