// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    front    = { "front", QueuePosition::Front },
    back     = { "back",  QueuePosition::Back },
    zero     = { "0",     QueuePosition::Index(0) },
    negative = { "-2",    QueuePosition::Index(-2) },
)]
fn positions_parse(text: &str, expected: QueuePosition) {
    assert_eq!(parse_position(text).unwrap(), expected);
}

#[test]
fn garbage_position_is_an_argument_error() {
    assert!(parse_position("sideways").is_err());
}

#[test]
fn add_builds_a_plan_spec() {
    let req = build(Cmd::Queue(QueueCmd::Add {
        name: "count".to_string(),
        args: Some(r#"[["det1", "det2"]]"#.to_string()),
        kwargs: Some(r#"{"num": 5}"#.to_string()),
        pos: None,
        before_uid: None,
        after_uid: None,
    }))
    .unwrap();
    match req {
        ControlRequest::QueueItemAdd { item, pos } => {
            assert_eq!(item.name, "count");
            assert_eq!(item.args.len(), 1);
            assert_eq!(item.kwargs["num"], serde_json::json!(5));
            assert!(pos.is_none());
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn add_with_bad_kwargs_fails() {
    let err = build(Cmd::Queue(QueueCmd::Add {
        name: "count".to_string(),
        args: None,
        kwargs: Some("not json".to_string()),
        pos: None,
        before_uid: None,
        after_uid: None,
    }))
    .unwrap_err();
    assert!(err.to_string().contains("kwargs"));
}

#[test]
fn move_requires_source_and_destination() {
    let err = build(Cmd::Queue(QueueCmd::Move {
        pos: None,
        uid: None,
        dest: Some("front".to_string()),
        before_uid: None,
        after_uid: None,
    }))
    .unwrap_err();
    assert!(err.to_string().contains("source"));

    let err = build(Cmd::Queue(QueueCmd::Move {
        pos: Some(0),
        uid: None,
        dest: None,
        before_uid: None,
        after_uid: None,
    }))
    .unwrap_err();
    assert!(err.to_string().contains("destination"));
}

#[test]
fn manager_stop_maps_the_unsafe_flag() {
    let req = build(Cmd::Manager(ManagerCmd::Stop { force: true })).unwrap();
    assert_eq!(req, ControlRequest::ManagerStop { option: StopOption::SafeOff });
    let req = build(Cmd::Manager(ManagerCmd::Stop { force: false })).unwrap();
    assert_eq!(req, ControlRequest::ManagerStop { option: StopOption::SafeOn });
}
