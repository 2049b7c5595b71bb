// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the replay engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::test_helpers::{make_item, row, RecordingSink, SinkCall};
use rq_core::{NewMutation, RowId};
use serde_json::json;
use std::time::Instant;

fn engine(sink: &RecordingSink) -> ReplayEngine {
    ReplayEngine::new(Arc::new(sink.clone()), Duration::ZERO, None)
}

#[tokio::test]
async fn dispatches_each_variant_to_matching_call() {
    let sink = RecordingSink::new();
    let items = vec![
        QueueItem::stamp(NewMutation::insert("history", row(json!({"label": "A"})))),
        QueueItem::stamp(NewMutation::update(
            "inventory",
            7,
            row(json!({"id": 7, "qty": 2})),
        )),
        QueueItem::stamp(NewMutation::delete("inventory", "x-1")),
    ];

    let result = engine(&sink).run(&items).await;

    assert_eq!(result.applied, 3);
    assert!(result.retained.is_empty());
    assert_eq!(
        sink.calls(),
        vec![
            SinkCall::Insert {
                table: "history".into(),
                row: row(json!({"label": "A"})),
            },
            SinkCall::Update {
                table: "inventory".into(),
                id: RowId::Int(7),
                changes: row(json!({"qty": 2})),
            },
            SinkCall::Delete {
                table: "inventory".into(),
                id: RowId::from("x-1"),
            },
        ]
    );
}

#[tokio::test]
async fn preserves_snapshot_order() {
    let sink = RecordingSink::new();
    let items: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|label| make_item("history", label))
        .collect();

    engine(&sink).run(&items).await;

    assert_eq!(sink.labels(), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn failure_does_not_abort_cycle() {
    let sink = RecordingSink::new();
    sink.fail_label("B");
    let items: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|label| make_item("history", label))
        .collect();

    let result = engine(&sink).run(&items).await;

    assert_eq!(sink.labels(), vec!["A", "B", "C"]);
    assert_eq!(result.applied, 2);
    assert_eq!(result.retained, vec![items[1].clone()]);
    assert_eq!(
        result.report(items.len()),
        ReplayReport {
            attempted: 3,
            applied: 2,
            retained: 1,
        }
    );
}

#[tokio::test]
async fn retained_items_keep_relative_order() {
    let sink = RecordingSink::new();
    sink.fail_when(|call| matches!(call.label(), Some("A") | Some("C")));
    let items: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|label| make_item("history", label))
        .collect();

    let result = engine(&sink).run(&items).await;

    assert_eq!(result.retained, vec![items[0].clone(), items[2].clone()]);
}

#[tokio::test]
async fn empty_snapshot_makes_no_calls() {
    let sink = RecordingSink::new();
    let result = engine(&sink).run(&[]).await;

    assert_eq!(result, CycleResult::default());
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn slow_call_past_timeout_is_retained() {
    let sink = RecordingSink::slow(Duration::from_millis(500));
    let engine = ReplayEngine::new(
        Arc::new(sink.clone()),
        Duration::ZERO,
        Some(Duration::from_millis(20)),
    );
    let item = make_item("history", "A");

    assert_eq!(engine.dispatch(&item).await, Err(SinkError::Timeout));

    let result = engine.run(std::slice::from_ref(&item)).await;
    assert_eq!(result.retained, vec![item]);
}

#[tokio::test]
async fn delay_applies_before_each_dispatch() {
    let sink = RecordingSink::new();
    let engine = ReplayEngine::new(Arc::new(sink.clone()), Duration::from_millis(20), None);
    let items = vec![make_item("history", "A"), make_item("history", "B")];

    let started = Instant::now();
    engine.run(&items).await;

    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(sink.labels(), vec!["A", "B"]);
}

#[test]
fn flag_admits_one_claim_at_a_time() {
    let flag = SyncFlag::new();

    let claim = flag.try_claim().expect("first claim");
    assert!(flag.is_set());
    assert!(flag.try_claim().is_none());

    drop(claim);
    assert!(!flag.is_set());
    assert!(flag.try_claim().is_some());
}

#[test]
fn skipped_outcome_applies_nothing() {
    assert_eq!(ReplayOutcome::Skipped(SkipReason::Offline).applied(), 0);
    assert_eq!(
        ReplayOutcome::Completed(ReplayReport {
            attempted: 2,
            applied: 1,
            retained: 1,
        })
        .applied(),
        1
    );
}
