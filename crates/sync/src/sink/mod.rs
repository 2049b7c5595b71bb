// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote sink abstraction.
//!
//! A sink applies one mutation to the remote store. The trait is object-safe
//! so the replay engine can hold any implementation behind an `Arc`:
//! - [`RestSink`] for PostgREST / Supabase endpoints
//! - in-memory recording sinks for tests

mod rest;

pub use rest::RestSink;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rq_core::{Row, RowId};

/// Error reported by a remote sink.
///
/// Replay treats every variant the same way (the item is retained); the
/// variants exist for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered and refused the write.
    #[error("rejected by remote ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// No answer within the allowed time.
    #[error("remote call timed out")]
    Timeout,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Future returned by sink operations.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = SinkResult<()>> + Send + 'a>>;

/// Destination for replayed mutations.
pub trait RemoteSink: Send + Sync {
    /// Creates `row` in `table`.
    fn insert<'a>(&'a self, table: &'a str, row: &'a Row) -> SinkFuture<'a>;

    /// Applies `changes` to the row of `table` identified by `id`.
    fn update<'a>(&'a self, table: &'a str, id: &'a RowId, changes: &'a Row) -> SinkFuture<'a>;

    /// Removes the row of `table` identified by `id`.
    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> SinkFuture<'a>;
}

impl<T: RemoteSink + ?Sized> RemoteSink for Arc<T> {
    fn insert<'a>(&'a self, table: &'a str, row: &'a Row) -> SinkFuture<'a> {
        (**self).insert(table, row)
    }

    fn update<'a>(&'a self, table: &'a str, id: &'a RowId, changes: &'a Row) -> SinkFuture<'a> {
        (**self).update(table, id, changes)
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> SinkFuture<'a> {
        (**self).delete(table, id)
    }
}
