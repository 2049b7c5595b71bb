// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! replayq: durable offline mutation queue.
//!
//! Records intended writes while the remote store is unreachable and replays
//! them, in order, once connectivity returns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ online ┌──────────────┐        ┌──────────────┐
//! │ Connectivity │───────►│ SyncService  │───────►│ ReplayEngine │──► RemoteSink
//! │   Monitor    │        │   (handle)   │        └──────────────┘    (trait)
//! └──────────────┘        └──────┬───────┘
//!                                │ whole-list save / load
//!                                ▼
//!                         ┌──────────────┐
//!                         │  QueueStore  │──► KeyValueStore (file / sqlite / memory)
//!                         └──────────────┘
//! ```
//!
//! # Features
//!
//! - Queue persisted under a fixed key, surviving restarts
//! - Edge-triggered connectivity tracking
//! - Sequential, order-preserving replay with per-item failure isolation
//! - At most one replay cycle in flight
//! - PostgREST sink; injectable sink trait for testing

pub mod config;
pub mod connectivity;
pub mod logging;
pub mod replay;
pub mod service;
pub mod sink;
pub mod store;

pub use config::{Config, ConfigError, RemoteConfig, StorageBackend, StorageConfig};
pub use connectivity::{ConnectivityMonitor, ConnectivityWatch};
pub use replay::{ReplayEngine, ReplayOutcome, ReplayReport, SkipReason};
pub use rq_core::{ItemId, Mutation, MutationKind, NewMutation, QueueItem, Row, RowId};
pub use service::{SyncEvent, SyncService, SyncStatus, SyncWorker};
pub use sink::{RemoteSink, RestSink, SinkError, SinkFuture, SinkResult};
pub use store::{QueueStore, DEFAULT_QUEUE_KEY};

#[cfg(test)]
mod test_helpers;
