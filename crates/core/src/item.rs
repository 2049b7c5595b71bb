// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending mutations awaiting application against the remote store.
//!
//! A [`QueueItem`] records one intended write: an insert, update, or delete
//! of a row in a named remote table. Items are persisted as JSON objects of
//! the form
//!
//! ```text
//! {"id":"…","type":"UPDATE","table":"inventory","payload":{"id":7,"qty":3},"timestamp":1730000000000}
//! ```
//!
//! where `payload` is the full row for inserts, `{id, ...changes}` for
//! updates, and `{id}` for deletes. Decoding validates the payload against
//! the `type` tag, so a malformed entry fails to load rather than producing
//! an item that cannot be dispatched. Every item the constructors can build
//! encodes to a value that decodes back to the same item.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A row as sent to the remote store: a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// Column name carrying row identity in update and delete payloads.
pub const ID_COLUMN: &str = "id";

/// Identity of a remote row.
///
/// Remote tables key rows either by serial integers or by text (UUID) keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    /// Extracts a row id from a JSON value.
    ///
    /// Accepts exactly what [`RowId::to_value`] writes: any string, or an
    /// integer that fits in `i64`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RowId::Int),
            Value::String(s) => Some(RowId::Text(s.clone())),
            _ => None,
        }
    }

    /// Converts the id back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            RowId::Int(n) => Value::from(*n),
            RowId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(n) => write!(f, "{n}"),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        RowId::Int(n)
    }
}

impl From<i32> for RowId {
    fn from(n: i32) -> Self {
        RowId::Int(i64::from(n))
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId::Text(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId::Text(s)
    }
}

/// The tag persisted in an item's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "INSERT",
            MutationKind::Update => "UPDATE",
            MutationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The write a queue item performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create `row`.
    Insert { row: Row },
    /// Apply `changes` to the row identified by `id`.
    Update { id: RowId, changes: Row },
    /// Remove the row identified by `id`.
    Delete { id: RowId },
}

impl Mutation {
    pub fn insert(row: Row) -> Self {
        Mutation::Insert { row }
    }

    /// Creates an update. An `id` key inside `changes` is dropped; identity
    /// comes from `id` alone.
    pub fn update(id: impl Into<RowId>, mut changes: Row) -> Self {
        changes.remove(ID_COLUMN);
        Mutation::Update {
            id: id.into(),
            changes,
        }
    }

    pub fn delete(id: impl Into<RowId>) -> Self {
        Mutation::Delete { id: id.into() }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Insert { .. } => MutationKind::Insert,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Builds the persisted payload object.
    pub fn to_payload(&self) -> Row {
        match self {
            Mutation::Insert { row } => row.clone(),
            Mutation::Update { id, changes } => {
                let mut payload = Row::new();
                payload.insert(ID_COLUMN.to_string(), id.to_value());
                // `id` always comes from the identity, never from the changes.
                for (k, v) in changes.iter().filter(|(k, _)| k.as_str() != ID_COLUMN) {
                    payload.insert(k.clone(), v.clone());
                }
                payload
            }
            Mutation::Delete { id } => {
                let mut payload = Row::new();
                payload.insert(ID_COLUMN.to_string(), id.to_value());
                payload
            }
        }
    }

    /// Rebuilds a mutation from its persisted tag and payload.
    pub fn from_payload(kind: MutationKind, payload: Value) -> Result<Self> {
        let Value::Object(mut payload) = payload else {
            return Err(Error::InvalidItem(format!(
                "{kind} payload must be an object"
            )));
        };

        match kind {
            MutationKind::Insert => Ok(Mutation::Insert { row: payload }),
            MutationKind::Update => {
                let id = take_row_id(kind, &mut payload)?;
                Ok(Mutation::Update {
                    id,
                    changes: payload,
                })
            }
            MutationKind::Delete => {
                let id = take_row_id(kind, &mut payload)?;
                Ok(Mutation::Delete { id })
            }
        }
    }
}

fn take_row_id(kind: MutationKind, payload: &mut Row) -> Result<RowId> {
    payload
        .remove(ID_COLUMN)
        .as_ref()
        .and_then(RowId::from_value)
        .ok_or_else(|| Error::InvalidItem(format!("{kind} payload has no usable '{ID_COLUMN}'")))
}

/// Opaque local identifier of a queue item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        ItemId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

/// A mutation the caller wants queued, before it is stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMutation {
    /// Caller-supplied item id; generated at enqueue time when absent.
    pub id: Option<ItemId>,
    pub table: String,
    pub mutation: Mutation,
}

impl NewMutation {
    pub fn new(table: impl Into<String>, mutation: Mutation) -> Self {
        NewMutation {
            id: None,
            table: table.into(),
            mutation,
        }
    }

    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        Self::new(table, Mutation::insert(row))
    }

    pub fn update(table: impl Into<String>, id: impl Into<RowId>, changes: Row) -> Self {
        Self::new(table, Mutation::update(id, changes))
    }

    pub fn delete(table: impl Into<String>, id: impl Into<RowId>) -> Self {
        Self::new(table, Mutation::delete(id))
    }

    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A pending mutation awaiting application against the remote store.
///
/// Items are immutable once enqueued: replay either removes an item or keeps
/// it exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub struct QueueItem {
    pub id: ItemId,
    pub table: String,
    pub mutation: Mutation,
    /// Creation time, millisecond precision.
    pub timestamp: DateTime<Utc>,
}

impl QueueItem {
    /// Stamps a new mutation with an id (unless supplied) and the current time.
    pub fn stamp(new: NewMutation) -> Self {
        Self::stamp_at(new, Utc::now())
    }

    /// Stamps a new mutation with the given creation time.
    pub fn stamp_at(new: NewMutation, now: DateTime<Utc>) -> Self {
        QueueItem {
            id: new.id.unwrap_or_else(ItemId::generate),
            table: new.table,
            mutation: new.mutation,
            timestamp: now.trunc_subsecs(3),
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }
}

/// On-disk shape of a queue item.
#[derive(Serialize, Deserialize)]
struct RawItem {
    id: ItemId,
    #[serde(rename = "type")]
    kind: MutationKind,
    table: String,
    payload: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawItem> for QueueItem {
    type Error = Error;

    fn try_from(raw: RawItem) -> Result<Self> {
        Ok(QueueItem {
            mutation: Mutation::from_payload(raw.kind, raw.payload)?,
            id: raw.id,
            table: raw.table,
            timestamp: raw.timestamp,
        })
    }
}

impl From<QueueItem> for RawItem {
    fn from(item: QueueItem) -> Self {
        RawItem {
            kind: item.mutation.kind(),
            payload: Value::Object(item.mutation.to_payload()),
            id: item.id,
            table: item.table,
            timestamp: item.timestamp,
        }
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
