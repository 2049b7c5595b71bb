// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rq-core: Shared data model for the replayq offline mutation queue
//!
//! This crate provides the queue item types, their persisted JSON shape, and
//! the key-value backends the queue store is built on.

pub mod error;
pub mod item;
pub mod kv;

pub use error::{Error, Result};
pub use item::{ItemId, Mutation, MutationKind, NewMutation, QueueItem, Row, RowId};
pub use kv::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
