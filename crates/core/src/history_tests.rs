// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::plan::{PlanSpec, PlanUid};

fn entry(name: &str, status: PlanStatus) -> HistoryEntry {
    HistoryEntry {
        item: PlanSpec::new(name).into_item(PlanUid::new(), 0),
        status,
        err_msg: None,
        finished_at_epoch_ms: 42,
    }
}

#[test]
fn append_preserves_order() {
    let mut history = History::new();
    history.append(entry("a", PlanStatus::Completed));
    history.append(entry("b", PlanStatus::Aborted));

    let snapshot = history.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].item.name, "a");
    assert_eq!(snapshot[1].item.name, "b");
    assert_eq!(snapshot[1].status, PlanStatus::Aborted);
}

#[test]
fn clear_empties_history() {
    let mut history = History::new();
    history.append(entry("a", PlanStatus::Failed));
    history.clear();
    assert!(history.is_empty());
}

#[test]
fn entry_serde_omits_missing_error() {
    let json = serde_json::to_value(entry("a", PlanStatus::Completed)).unwrap();
    assert!(json.get("err_msg").is_none());
    assert_eq!(json["status"], "completed");
}
