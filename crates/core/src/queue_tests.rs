// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;

fn item(name: &str) -> PlanItem {
    crate::plan::PlanSpec::new(name).into_item(crate::plan::PlanUid::new(), 0)
}

fn queue_of(names: &[&str]) -> PlanQueue {
    let mut q = PlanQueue::new();
    for name in names {
        q.insert(item(name), &QueuePosition::Back).unwrap();
    }
    q
}

fn names(q: &PlanQueue) -> Vec<String> {
    q.iter().map(|i| i.name.clone()).collect()
}

fn uid_at(q: &PlanQueue, idx: i64) -> PlanUid {
    q.get(Some(&ItemRef::Index(idx))).unwrap().plan_uid.clone()
}

#[test]
fn insert_defaults_to_back() {
    let q = queue_of(&["a", "b", "c"]);
    assert_eq!(names(&q), vec!["a", "b", "c"]);
}

#[yare::parameterized(
    front        = { QueuePosition::Front,     0 },
    back         = { QueuePosition::Back,      3 },
    exact_start  = { QueuePosition::Index(0),  0 },
    exact_mid    = { QueuePosition::Index(2),  2 },
    exact_end    = { QueuePosition::Index(3),  3 },
    clamp_high   = { QueuePosition::Index(99), 3 },
    neg_one      = { QueuePosition::Index(-1), 2 },
    neg_len      = { QueuePosition::Index(-3), 0 },
    clamp_low    = { QueuePosition::Index(-99), 0 },
)]
fn insert_position_resolution(pos: QueuePosition, expected: usize) {
    let mut q = queue_of(&["a", "b", "c"]);
    let idx = q.insert(item("x"), &pos).unwrap();
    assert_eq!(idx, expected);
    assert_eq!(q.len(), 4);
    assert_eq!(names(&q)[expected], "x");
}

#[test]
fn insert_before_uid() {
    let mut q = queue_of(&["a", "b"]);
    let a = uid_at(&q, 0);
    q.insert(item("c"), &QueuePosition::BeforeUid(a)).unwrap();
    assert_eq!(names(&q), vec!["c", "a", "b"]);
}

#[test]
fn insert_after_uid() {
    let mut q = queue_of(&["a", "b"]);
    let a = uid_at(&q, 0);
    q.insert(item("c"), &QueuePosition::AfterUid(a)).unwrap();
    assert_eq!(names(&q), vec!["a", "c", "b"]);
}

#[test]
fn insert_unknown_uid_fails_and_queue_unchanged() {
    let mut q = queue_of(&["a", "b"]);
    let before = q.clone();
    let err = q
        .insert(item("c"), &QueuePosition::BeforeUid(PlanUid::from_string("nope")))
        .unwrap_err();
    assert!(matches!(err, QueueError::UnknownUid(_)));
    assert_eq!(q, before);
}

#[test]
fn insert_duplicate_uid_fails() {
    let mut q = PlanQueue::new();
    let first = item("a");
    let dup = first.clone();
    q.insert(first, &QueuePosition::Back).unwrap();
    let err = q.insert(dup, &QueuePosition::Back).unwrap_err();
    assert!(matches!(err, QueueError::DuplicateUid(_)));
    assert_eq!(q.len(), 1);
}

#[test]
fn get_defaults_to_back() {
    let q = queue_of(&["a", "b", "c"]);
    assert_eq!(q.get(None).unwrap().name, "c");
}

#[yare::parameterized(
    first    = { 0,  "a" },
    last     = { 2,  "c" },
    neg_one  = { -1, "c" },
    neg_len  = { -3, "a" },
)]
fn get_by_index(idx: i64, expected: &str) {
    let q = queue_of(&["a", "b", "c"]);
    assert_eq!(q.get(Some(&ItemRef::Index(idx))).unwrap().name, expected);
}

#[yare::parameterized(
    past_end    = { 3 },
    far_out     = { 99 },
    neg_too_far = { -4 },
)]
fn get_out_of_range_fails(idx: i64) {
    let q = queue_of(&["a", "b", "c"]);
    let err = q.get(Some(&ItemRef::Index(idx))).unwrap_err();
    assert_eq!(err, QueueError::OutOfRange(idx));
}

#[test]
fn get_from_empty_queue_fails() {
    let q = PlanQueue::new();
    assert_eq!(q.get(None).unwrap_err(), QueueError::Empty);
}

#[test]
fn remove_by_uid() {
    let mut q = queue_of(&["a", "b", "c"]);
    let b = uid_at(&q, 1);
    let removed = q.remove(Some(&ItemRef::Uid(b))).unwrap();
    assert_eq!(removed.name, "b");
    assert_eq!(names(&q), vec!["a", "c"]);
}

#[test]
fn remove_defaults_to_back() {
    let mut q = queue_of(&["a", "b"]);
    assert_eq!(q.remove(None).unwrap().name, "b");
    assert_eq!(names(&q), vec!["a"]);
}

#[test]
fn remove_very_negative_position_fails() {
    // Removal rejects out-of-range positions where insertion would clamp.
    let mut q = queue_of(&["a", "b"]);
    let err = q.remove(Some(&ItemRef::Index(-3))).unwrap_err();
    assert_eq!(err, QueueError::OutOfRange(-3));
    assert_eq!(q.len(), 2);
}

#[test]
fn remove_unknown_uid_fails() {
    let mut q = queue_of(&["a"]);
    let err = q.remove(Some(&ItemRef::Uid(PlanUid::from_string("nope")))).unwrap_err();
    assert!(matches!(err, QueueError::UnknownUid(_)));
    assert_eq!(q.len(), 1);
}

#[test]
fn move_to_back() {
    let mut q = queue_of(&["a", "b", "c"]);
    let (moved, idx) = q.move_item(&ItemRef::Index(0), &MoveDestination::Back).unwrap();
    assert_eq!(moved.name, "a");
    assert_eq!(idx, 2);
    assert_eq!(names(&q), vec!["b", "c", "a"]);
}

#[test]
fn move_before_uid() {
    let mut q = queue_of(&["a", "b", "c"]);
    let a = uid_at(&q, 0);
    q.move_item(&ItemRef::Index(2), &MoveDestination::BeforeUid(a)).unwrap();
    assert_eq!(names(&q), vec!["c", "a", "b"]);
}

#[test]
fn move_after_uid() {
    let mut q = queue_of(&["a", "b", "c"]);
    let c = uid_at(&q, 2);
    q.move_item(&ItemRef::Index(0), &MoveDestination::AfterUid(c)).unwrap();
    assert_eq!(names(&q), vec!["b", "c", "a"]);
}

#[test]
fn move_dst_out_of_range_leaves_queue_unchanged() {
    let mut q = queue_of(&["a", "b", "c"]);
    let before = q.clone();
    let err = q.move_item(&ItemRef::Index(0), &MoveDestination::Index(3)).unwrap_err();
    assert_eq!(err, QueueError::OutOfRange(3));
    assert_eq!(q, before);
}

#[test]
fn move_onto_self_fails_and_queue_unchanged() {
    let mut q = queue_of(&["a", "b"]);
    let before = q.clone();
    let a = uid_at(&q, 0);
    let err = q
        .move_item(&ItemRef::Uid(a.clone()), &MoveDestination::BeforeUid(a))
        .unwrap_err();
    assert_eq!(err, QueueError::MoveOntoSelf);
    assert_eq!(q, before);
}

#[test]
fn pop_front_and_push_front() {
    let mut q = queue_of(&["a", "b"]);
    let popped = q.pop_front().unwrap();
    assert_eq!(popped.name, "a");
    assert_eq!(q.len(), 1);
    q.push_front(popped);
    assert_eq!(names(&q), vec!["a", "b"]);
}

#[test]
fn clear_empties_queue() {
    let mut q = queue_of(&["a", "b"]);
    q.clear();
    assert!(q.is_empty());
}

#[test]
fn serde_roundtrip_is_transparent_list() {
    let q = queue_of(&["a", "b"]);
    let json = serde_json::to_value(&q).unwrap();
    assert!(json.is_array());
    let parsed: PlanQueue = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, q);
}

proptest! {
    // Insert(p) then Remove(uid(p)) leaves the queue unchanged.
    #[test]
    fn insert_then_remove_is_identity(len in 0usize..6, pos in -8i64..8) {
        let q = queue_of(&["a", "b", "c", "d", "e", "f"][..len].to_vec().as_slice());
        let mut mutated = q.clone();
        let new_item = item("x");
        let uid = new_item.plan_uid.clone();
        mutated.insert(new_item, &QueuePosition::Index(pos)).unwrap();
        mutated.remove(Some(&ItemRef::Uid(uid))).unwrap();
        prop_assert_eq!(mutated, q);
    }

    // Move(src -> dst) followed by Move(dst -> src) is identity.
    #[test]
    fn move_then_move_back_is_identity(len in 1usize..6, src in 0usize..6, dst in 0usize..6) {
        let src = (src % len) as i64;
        let dst = (dst % len) as i64;
        let q = queue_of(&["a", "b", "c", "d", "e", "f"][..len].to_vec().as_slice());
        let mut mutated = q.clone();
        mutated.move_item(&ItemRef::Index(src), &MoveDestination::Index(dst)).unwrap();
        mutated.move_item(&ItemRef::Index(dst), &MoveDestination::Index(src)).unwrap();
        prop_assert_eq!(mutated, q);
    }
}
