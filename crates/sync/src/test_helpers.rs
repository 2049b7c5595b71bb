// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use rq_core::{KeyValueStore, MemoryStore, NewMutation, QueueItem, Row, RowId};

use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::service::SyncService;
use crate::sink::{RemoteSink, SinkError, SinkFuture};

/// Builds a row from a `json!` object literal.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// An insert into `table` whose row carries `label`.
pub fn make_insert(table: &str, label: &str) -> NewMutation {
    NewMutation::insert(table, row(serde_json::json!({ "label": label })))
}

/// A stamped insert item, for engine-level tests.
pub fn make_item(table: &str, label: &str) -> QueueItem {
    QueueItem::stamp(make_insert(table, label))
}

/// Default config with the inter-item pause disabled.
pub fn test_config() -> Config {
    Config {
        replay_delay_ms: 0,
        ..Config::default()
    }
}

/// A service over an in-memory store and the given sink.
pub fn make_service(sink: &RecordingSink, online: bool) -> SyncService {
    SyncService::new(
        &test_config(),
        MemoryStore::new(),
        sink.clone(),
        ConnectivityMonitor::new(online),
    )
}

/// A call observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Insert { table: String, row: Row },
    Update { table: String, id: RowId, changes: Row },
    Delete { table: String, id: RowId },
}

impl SinkCall {
    /// The `label` column of an insert, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            SinkCall::Insert { row, .. } => row.get("label").and_then(Value::as_str),
            _ => None,
        }
    }
}

type FailWhen = Box<dyn Fn(&SinkCall) -> bool + Send + Sync>;

/// Remote sink that records every call and fails the ones a predicate picks.
///
/// Clones share the recorded calls, so a test can keep one handle while the
/// service owns another.
#[derive(Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    fail_when: Arc<Mutex<Option<FailWhen>>>,
    latency: Duration,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that takes `latency` to answer each call.
    pub fn slow(latency: Duration) -> Self {
        RecordingSink {
            latency,
            ..Self::default()
        }
    }

    /// Fails calls matching `predicate` with a rejection.
    pub fn fail_when(&self, predicate: impl Fn(&SinkCall) -> bool + Send + Sync + 'static) {
        *self.fail_when.lock().unwrap() = Some(Box::new(predicate));
    }

    /// Fails inserts whose row has the given `label`.
    pub fn fail_label(&self, label: &'static str) {
        self.fail_when(move |call| call.label() == Some(label));
    }

    /// Lets every call succeed again.
    pub fn heal(&self) {
        *self.fail_when.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Labels of recorded inserts, in call order.
    pub fn labels(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.label().map(str::to_string))
            .collect()
    }

    fn record(&self, call: SinkCall) -> SinkFuture<'_> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(call.clone());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let failing = self
                .fail_when
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|f| f(&call));
            if failing {
                Err(SinkError::Rejected {
                    status: 400,
                    message: "rejected by test sink".into(),
                })
            } else {
                Ok(())
            }
        })
    }
}

impl RemoteSink for RecordingSink {
    fn insert<'a>(&'a self, table: &'a str, row: &'a Row) -> SinkFuture<'a> {
        self.record(SinkCall::Insert {
            table: table.to_string(),
            row: row.clone(),
        })
    }

    fn update<'a>(&'a self, table: &'a str, id: &'a RowId, changes: &'a Row) -> SinkFuture<'a> {
        self.record(SinkCall::Update {
            table: table.to_string(),
            id: id.clone(),
            changes: changes.clone(),
        })
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> SinkFuture<'a> {
        self.record(SinkCall::Delete {
            table: table.to_string(),
            id: id.clone(),
        })
    }
}

/// Memory store that counts writes.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> rq_core::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> rq_core::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> rq_core::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> rq_core::Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> rq_core::Result<()> {
        Err(std::io::Error::other("disk full").into())
    }

    fn remove(&self, _key: &str) -> rq_core::Result<()> {
        Err(std::io::Error::other("disk full").into())
    }
}
