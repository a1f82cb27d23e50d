// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against the real three-process tree: `runqd`
//! supervising `runq-manager` and `runq-worker`, driven via the `runq`
//! CLI in a temporary state directory.

use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use serial_test::serial;

const READY_DEADLINE: Duration = Duration::from_secs(30);
const SETTLE_DEADLINE: Duration = Duration::from_secs(60);

struct Server {
    state_dir: tempfile::TempDir,
    watchdog: Child,
}

impl Server {
    fn start() -> Self {
        let state_dir = tempfile::tempdir().expect("tempdir");
        let watchdog = Command::new(assert_cmd::cargo::cargo_bin("runqd"))
            .env("RUNQ_STATE_DIR", state_dir.path())
            .env("RUNQ_MANAGER_BIN", assert_cmd::cargo::cargo_bin("runq-manager"))
            .env("RUNQ_WORKER_BIN", assert_cmd::cargo::cargo_bin("runq-worker"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn runqd");
        let server = Self { state_dir, watchdog };
        server.wait_ready();
        server
    }

    fn runq(&self, args: &[&str]) -> Output {
        Command::new(assert_cmd::cargo::cargo_bin("runq"))
            .env("RUNQ_STATE_DIR", self.state_dir.path())
            .args(args)
            .output()
            .expect("run runq")
    }

    fn runq_ok(&self, args: &[&str]) -> Value {
        let output = self.runq(args);
        assert!(
            output.status.success(),
            "runq {args:?} failed: {}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        serde_json::from_slice(&output.stdout).expect("reply is JSON")
    }

    fn exit_code(&self, args: &[&str]) -> i32 {
        self.runq(args).status.code().unwrap_or(-1)
    }

    fn status(&self) -> Option<Value> {
        let output = self.runq(&["status", "--timeout-ms", "1000"]);
        if !output.status.success() {
            return None;
        }
        serde_json::from_slice(&output.stdout).ok()
    }

    fn wait_ready(&self) {
        let deadline = Instant::now() + READY_DEADLINE;
        loop {
            if self.runq(&["ping", "--timeout-ms", "1000"]).status.success() {
                return;
            }
            assert!(Instant::now() < deadline, "server never became ready");
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    /// Poll `runq status` until the predicate holds. Tolerates windows
    /// where the manager is unresponsive (watchdog restart in progress).
    fn wait_status(&self, what: &str, pred: impl Fn(&Value) -> bool) -> Value {
        let deadline = Instant::now() + SETTLE_DEADLINE;
        let mut last = None;
        loop {
            if let Some(status) = self.status() {
                if pred(&status) {
                    return status;
                }
                last = Some(status);
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {what}; last status: {last:?}"
            );
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    fn open_environment(&self) {
        self.runq_ok(&["env", "open"]);
        self.wait_status("environment open", |s| s["env_state"] == json!("open"));
    }

    /// Add a plan with explicit step count and per-step delay (seconds).
    fn add_plan(&self, name: &str, num: u64, delay: f64) -> String {
        let kwargs = format!(r#"{{"num": {num}, "delay": {delay}}}"#);
        let reply = self.runq_ok(&["queue", "add", name, "--kwargs", &kwargs]);
        reply["item"]["plan_uid"].as_str().expect("plan_uid").to_string()
    }

    fn history(&self) -> Vec<Value> {
        self.runq_ok(&["history", "list"])["items"].as_array().expect("items").clone()
    }

    fn queue_items(&self) -> Vec<Value> {
        self.runq_ok(&["queue", "list"])["items"].as_array().expect("items").clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.runq(&["manager", "stop", "--unsafe", "--timeout-ms", "2000"]);
        std::thread::sleep(Duration::from_millis(500));
        let _ = self.watchdog.kill();
        let _ = self.watchdog.wait();
    }
}

#[test]
#[serial]
fn basic_execution() {
    let server = Server::start();
    server.open_environment();

    server.add_plan("count", 3, 0.05);
    server.runq_ok(&["queue", "start"]);

    server.wait_status("queue drained", |s| {
        s["items_in_history"] == json!(1)
            && s["items_in_queue"] == json!(0)
            && s["manager_state"] == json!("idle")
    });
    assert_eq!(server.history()[0]["status"], json!("completed"));
}

#[test]
#[serial]
fn rejected_and_malformed_requests_exit_codes() {
    let server = Server::start();

    // Valid request, rejected by state: exit 2.
    assert_eq!(server.exit_code(&["queue", "start"]), 2);
    // Client-side argument errors: exit 4, never reach the manager.
    assert_eq!(server.exit_code(&["queue", "add", "count", "--kwargs", "not json"]), 4);
    assert_eq!(server.exit_code(&["queue", "get", "--pos", "sideways"]), 4);
    assert_eq!(server.exit_code(&["no-such-command"]), 4);
}

#[test]
#[serial]
fn pause_resume_completes() {
    let server = Server::start();
    server.open_environment();

    server.add_plan("count", 60, 0.05);
    server.runq_ok(&["queue", "start"]);
    server.wait_status("executing", |s| s["manager_state"] == json!("executing_queue"));
    std::thread::sleep(Duration::from_millis(500));

    server.runq_ok(&["re", "pause"]);
    server.wait_status("paused", |s| s["manager_state"] == json!("paused"));

    server.runq_ok(&["re", "resume"]);
    server.wait_status("terminal", |s| {
        s["items_in_history"] == json!(1) && s["manager_state"] == json!("idle")
    });

    assert_eq!(server.history()[0]["status"], json!("completed"));
    assert!(server.queue_items().is_empty());
}

#[test]
#[serial]
fn abort_leaves_queue_unchanged() {
    let server = Server::start();
    server.open_environment();

    server.add_plan("count", 200, 0.05);
    let second = server.add_plan("count", 1, 0.01);
    server.runq_ok(&["queue", "start"]);
    server.wait_status("executing", |s| s["manager_state"] == json!("executing_queue"));

    server.runq_ok(&["re", "pause", "--immediate"]);
    server.wait_status("paused", |s| s["manager_state"] == json!("paused"));
    server.runq_ok(&["re", "abort"]);

    server.wait_status("aborted", |s| s["manager_state"] == json!("idle"));
    let history = server.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], json!("aborted"));
    // The aborted plan is NOT re-queued; the untouched second plan still
    // waits for an explicit queue_start.
    let queue = server.queue_items();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["plan_uid"], json!(second));
}

#[test]
#[serial]
fn manager_kill_preserves_the_running_plan() {
    let server = Server::start();
    server.open_environment();

    let p1 = server.add_plan("count", 300, 0.05);
    server.add_plan("count", 1, 0.01);
    server.add_plan("count", 1, 0.01);
    server.runq_ok(&["queue", "start"]);
    server.wait_status("executing", |s| s["manager_state"] == json!("executing_queue"));
    std::thread::sleep(Duration::from_secs(1));

    // The kill is a sink: the CLI times out.
    assert_ne!(server.exit_code(&["manager", "kill", "--timeout-ms", "1000"]), 0);

    // The watchdog restarts the manager in ~5s; the worker keeps
    // executing P1 and the fresh manager re-adopts it.
    std::thread::sleep(Duration::from_secs(8));
    let status = server.wait_status("restarted manager", |s| {
        s["manager_state"] == json!("executing_queue") || s["manager_state"] == json!("idle")
    });
    if status["manager_state"] == json!("executing_queue") {
        assert_eq!(status["running_item_uid"], json!(p1));
    }

    server.wait_status("all three settled", |s| {
        s["items_in_history"] == json!(3)
            && s["items_in_queue"] == json!(0)
            && s["manager_state"] == json!("idle")
    });
    let history = server.history();
    assert_eq!(history[0]["item"]["plan_uid"], json!(p1));
    assert_eq!(history[0]["status"], json!("completed"));
}

#[test]
#[serial]
fn environment_destroy_requeues_the_running_plan() {
    let server = Server::start();
    server.open_environment();

    let p1 = server.add_plan("count", 200, 0.05);
    server.runq_ok(&["queue", "start"]);
    server.wait_status("executing", |s| s["manager_state"] == json!("executing_queue"));
    std::thread::sleep(Duration::from_secs(2));

    server.runq_ok(&["env", "destroy"]);

    let status = server.wait_status("destroyed", |s| {
        s["manager_state"] == json!("idle") && s["env_state"] == json!("closed")
    });
    assert_eq!(status["items_in_queue"], json!(1));

    // P1 is re-queued at the front and its interrupted attempt is
    // recorded as failed.
    let queue = server.queue_items();
    assert_eq!(queue[0]["plan_uid"], json!(p1));
    let history = server.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], json!("failed"));

    // A fresh environment resumes the re-queued plan.
    server.open_environment();
    server.runq_ok(&["queue", "start"]);
    server.wait_status("resumed after destroy", |s| {
        s["manager_state"] == json!("executing_queue") || s["items_in_history"] == json!(2)
    });
}

#[test]
#[serial]
fn insert_before_uid_orders_the_queue() {
    let server = Server::start();

    let a = server.add_plan("count", 1, 0.01);
    let b = server.add_plan("count", 1, 0.01);
    let reply = server.runq_ok(&["queue", "add", "count", "--before-uid", &a]);
    let c = reply["item"]["plan_uid"].as_str().expect("plan_uid").to_string();

    let queue = server.queue_items();
    let uids: Vec<&str> = queue.iter().map(|i| i["plan_uid"].as_str().expect("uid")).collect();
    assert_eq!(uids, vec![c.as_str(), a.as_str(), b.as_str()]);
}

#[test]
#[serial]
fn orderly_stop_takes_the_whole_tree_down() {
    let mut server = Server::start();
    server.open_environment();

    server.runq_ok(&["manager", "stop"]);

    // The watchdog notices the intentional stop and exits by itself.
    let deadline = Instant::now() + READY_DEADLINE;
    loop {
        match server.watchdog.try_wait().expect("try_wait") {
            Some(status) => {
                assert!(status.success(), "runqd exited with {status:?}");
                break;
            }
            None => {
                assert!(Instant::now() < deadline, "runqd never exited");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}
