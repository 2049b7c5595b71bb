// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue store.
//!
//! The whole queue lives under one key as a JSON array of items. Every
//! change rewrites the full list; there is no incremental append. A value
//! that is missing, unreadable, or fails to decode loads as an empty queue.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use rq_core::{Error, KeyValueStore, QueueItem, Result};

/// Key the queue is stored under unless configured otherwise.
pub const DEFAULT_QUEUE_KEY: &str = "offline_queue";

/// Ordered list of pending items persisted in a key-value backend.
pub struct QueueStore {
    kv: Box<dyn KeyValueStore>,
    key: String,
    /// Held across every write, so a save cannot land inside an enqueue's
    /// load-append-save.
    write: Mutex<()>,
}

impl QueueStore {
    /// Creates a store persisting under `key`.
    pub fn new(kv: impl KeyValueStore + 'static, key: impl Into<String>) -> Self {
        QueueStore {
            kv: Box::new(kv),
            key: key.into(),
            write: Mutex::new(()),
        }
    }

    /// Creates a store persisting under [`DEFAULT_QUEUE_KEY`].
    pub fn with_default_key(kv: impl KeyValueStore + 'static) -> Self {
        Self::new(kv, DEFAULT_QUEUE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the persisted queue.
    ///
    /// Never fails: a missing value is an empty queue, and so is a corrupt one.
    pub fn load(&self) -> Vec<QueueItem> {
        match self.try_load() {
            Ok(items) => items,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable offline queue");
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<QueueItem>> {
        match self.kv.get(&self.key)? {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Replaces the persisted queue with `items`.
    pub fn save(&self, items: &[QueueItem]) -> Result<()> {
        let _guard = self.write_guard()?;
        self.write_items(items)
    }

    /// Appends `item` to the persisted queue and returns the new contents.
    pub fn enqueue(&self, item: QueueItem) -> Result<Vec<QueueItem>> {
        let _guard = self.write_guard()?;

        let mut items = self.load();
        items.push(item);
        self.write_items(&items)?;
        Ok(items)
    }

    fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write
            .lock()
            .map_err(|_| Error::Lock("queue write mutex poisoned".to_string()))
    }

    fn write_items(&self, items: &[QueueItem]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.kv.set(&self.key, &json)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
