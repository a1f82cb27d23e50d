// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;

#[yare::parameterized(
    start  = { WatchdogRequest::StartReWorker,               "start_re_worker" },
    join   = { WatchdogRequest::JoinReWorker { timeout_ms: 500 }, "join_re_worker" },
    kill   = { WatchdogRequest::KillReWorker,                "kill_re_worker" },
    alive  = { WatchdogRequest::IsWorkerAlive,               "is_worker_alive" },
)]
fn request_method_names(req: WatchdogRequest, method: &str) {
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value["method"], method);
}

#[test]
fn heartbeat_notification_wire_shape() {
    let n = WatchdogNotification::Heartbeat { value: HEARTBEAT_ALIVE.to_string() };
    let value = serde_json::to_value(&n).unwrap();
    assert_eq!(value, json!({"method": "heartbeat", "params": {"value": "alive"}}));
}

#[test]
fn manager_stopping_has_no_params() {
    let value = serde_json::to_value(WatchdogNotification::ManagerStopping).unwrap();
    assert_eq!(value, json!({"method": "manager_stopping"}));
}

#[test]
fn start_reply_defaults_err_msg() {
    let reply: StartReWorkerReply = serde_json::from_value(json!({"success": true})).unwrap();
    assert!(reply.success);
    assert!(reply.err_msg.is_empty());
}
